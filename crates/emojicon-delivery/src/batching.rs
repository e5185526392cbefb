/// Splits `text` into bodies of at most `max_chars` characters.
///
/// Lines (up to and including their `\n`) are kept whole whenever they fit;
/// a single line longer than `max_chars` is cut at character boundaries.
/// Concatenating the result reproduces `text` exactly.
pub fn split_into_batches(text: &str, max_chars: usize) -> Vec<String> {
    if text.is_empty() || max_chars == 0 {
        return Vec::new();
    }
    let mut batches = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len.saturating_add(line_len) > max_chars && !current.is_empty() {
            batches.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len <= max_chars {
            current.push_str(line);
            current_len = current_len.saturating_add(line_len);
            continue;
        }
        for ch in line.chars() {
            if current_len == max_chars {
                batches.push(std::mem::take(&mut current));
                current_len = 0;
            }
            current.push(ch);
            current_len += 1;
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}
