//! `pvb explain`: error catalog lookup.

use anyhow::{Result, bail};
use pvb_common::{ErrorCode, ErrorEntry};

pub fn run(code: Option<&str>, json: bool) -> Result<()> {
    let entries: Vec<ErrorEntry> = match code {
        Some(raw) => match find(raw) {
            Some(code) => vec![code.entry()],
            None => bail!("unknown error code '{raw}'"),
        },
        None => ErrorCode::all().iter().map(ErrorCode::entry).collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if code.is_some() {
        for entry in &entries {
            print!("{}", entry.format_full());
        }
    } else {
        for entry in &entries {
            println!("{}", entry.format_brief());
        }
    }
    Ok(())
}

/// Accepts `PVB-E200`, `E200` or `200`.
fn find(raw: &str) -> Option<ErrorCode> {
    let upper = raw.trim().to_ascii_uppercase();
    let digits = upper.strip_prefix("PVB-").unwrap_or(&upper);
    let digits = digits.strip_prefix('E').unwrap_or(digits);
    let number: u16 = digits.parse().ok()?;
    ErrorCode::all()
        .iter()
        .copied()
        .find(|code| code.code_number() == number)
}
