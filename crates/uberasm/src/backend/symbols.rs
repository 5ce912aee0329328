//! WLA-format symbol file reader
//!
//! Only the `[labels]` section is read. Each line there is `BB:AAAA name`.

use super::Label;

pub fn parse_wla_symbols(text: &str) -> Vec<Label> {
    let mut labels = Vec::new();
    let mut in_labels = false;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') {
            in_labels = line == "[labels]";
            continue;
        }
        if !in_labels {
            continue;
        }

        let Some((location, name)) = line.split_once(char::is_whitespace) else {
            continue;
        };
        let Some((bank, offset)) = location.split_once(':') else {
            continue;
        };
        let (Ok(bank), Ok(offset)) = (u32::from_str_radix(bank, 16), u32::from_str_radix(offset, 16)) else {
            continue;
        };

        labels.push(Label::new(name.trim(), (bank << 16) | offset));
    }

    labels
}
