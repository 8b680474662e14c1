//
// MIT License
//
// Copyright (c) 2024 Firelink Data
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.
//
// File created: 2024-11-02
// Last updated: 2024-11-02
//

/// Join a record's already-stringified fields into one CSV row, quoting any
/// field that contains a comma, quote, or newline and doubling embedded
/// quotes per the usual CSV escaping rule.
pub fn row(fields: &[String]) -> String {
    fields
        .iter()
        .map(|field| escape(field))
        .collect::<Vec<_>>()
        .join(",")
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests_csv {
    use super::*;

    #[test]
    fn test_row_joins_plain_fields() {
        assert_eq!("1,tcp,443", row(&["1".to_string(), "tcp".to_string(), "443".to_string()]));
    }

    #[test]
    fn test_row_quotes_field_with_comma() {
        assert_eq!(
            "1,\"a,b\",3",
            row(&["1".to_string(), "a,b".to_string(), "3".to_string()])
        );
    }

    #[test]
    fn test_row_escapes_embedded_quotes() {
        assert_eq!("\"a\"\"b\"", row(&["a\"b".to_string()]));
    }
}
