//! HTML escaping for text and attribute output.

/// Escape HTML special characters: & < > " '
pub fn escape(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    escape_into(&mut output, input);
    output
}

/// Append `input` to `output`, escaping HTML special characters.
pub fn escape_into(output: &mut String, input: &str) {
    for c in input.chars() {
        match c {
            '&' => output.push_str("&amp;"),
            '<' => output.push_str("&lt;"),
            '>' => output.push_str("&gt;"),
            '"' => output.push_str("&quot;"),
            '\'' => output.push_str("&#39;"),
            _ => output.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_markup() {
        assert_eq!(
            escape("<script>alert('xss')</script>"),
            "&lt;script&gt;alert(&#39;xss&#39;)&lt;/script&gt;"
        );
    }

    #[test]
    fn test_escape_attribute_quotes() {
        assert_eq!(escape("a \"b\" & c"), "a &quot;b&quot; &amp; c");
    }

    #[test]
    fn test_escape_into_appends() {
        let mut out = String::from("<p>");
        escape_into(&mut out, "1 < 2");
        assert_eq!(out, "<p>1 &lt; 2");
    }

    #[test]
    fn test_no_escape_needed() {
        assert_eq!(escape("Hello, world!"), "Hello, world!");
    }
}
