/// 按字符（而非字节）截断，保证不会切断多字节字符
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("품명품명", 2), "품명");
        assert_eq!(truncate_chars("ab", 10), "ab");
        assert_eq!(truncate_chars("", 0), "");
    }
}
