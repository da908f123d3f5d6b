#[derive(Clone, Copy)]
pub(super) enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    BacktickQuoted,
    LineComment,
    BlockComment,
}

pub(super) fn scan_digits(bytes: &[u8], start: usize) -> Option<(usize, &str)> {
    scan_while(bytes, start, u8::is_ascii_digit)
}

/// Word characters of a `:name` placeholder (`\w` restricted to ASCII).
pub(super) fn scan_word(bytes: &[u8], start: usize) -> Option<(usize, &str)> {
    scan_while(bytes, start, |b| b.is_ascii_alphanumeric() || *b == b'_')
}

fn scan_while(bytes: &[u8], start: usize, accept: impl Fn(&u8) -> bool) -> Option<(usize, &str)> {
    let mut idx = start;
    while idx < bytes.len() && accept(&bytes[idx]) {
        idx += 1;
    }
    if idx == start {
        None
    } else {
        std::str::from_utf8(&bytes[start..idx])
            .ok()
            .map(|word| (idx, word))
    }
}
