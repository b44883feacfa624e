//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest ROM file name accepted.
const MAX_ROM_NAME_LEN: usize = 255;

/// Validates that a ROM name is a bare file name inside the ROM directory.
///
/// # Examples
///
/// ```ignore
/// validate_rom_name("pokemon_red.gb")   // Ok
/// validate_rom_name("../saves/x.state") // Err - escapes the directory
/// validate_rom_name("")                 // Err - empty
/// ```
pub fn validate_rom_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() || name.len() > MAX_ROM_NAME_LEN {
        let mut err = ValidationError::new("rom_name_length");
        err.message = Some(
            format!("ROM name must be 1 to {MAX_ROM_NAME_LEN} characters (got {})", name.len())
                .into(),
        );
        return Err(err);
    }

    if name.contains(['/', '\\', '\0']) || name == "." || name.contains("..") {
        let mut err = ValidationError::new("rom_name_format");
        err.message = Some("ROM name must be a plain file name from the ROM list".into());
        return Err(err);
    }

    Ok(())
}
