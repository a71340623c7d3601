use bindery_core::OutputKind;

/// Suggested download name: `{document} - Chapter {n}.{cbz|pdf}`, safe on every filesystem.
pub fn artifact_filename(document_name: &str, sequence_number: u32, kind: OutputKind) -> String {
    let title = sanitize_title(document_name);
    format!(
        "{title} - Chapter {sequence_number}.{}",
        kind.file_extension()
    )
}

fn sanitize_title(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches(&['_', ' ', '.'][..]);

    // Collapse runs of underscores and whitespace.
    let mut compacted = String::with_capacity(cleaned.len());
    let mut prev: Option<char> = None;
    for c in cleaned.chars() {
        let c = if c.is_whitespace() { ' ' } else { c };
        if (c == '_' || c == ' ') && prev == Some(c) {
            continue;
        }
        compacted.push(c);
        prev = Some(c);
    }

    if compacted.is_empty() {
        compacted = "untitled".to_string();
    }
    if compacted.chars().count() > 100 {
        compacted = compacted.chars().take(100).collect();
    }
    if is_reserved_windows_name(&compacted) {
        compacted.push('_');
    }
    compacted
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}
