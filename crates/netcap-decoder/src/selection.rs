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

use netcap_common::error::{Result, SetupError};

/// Apply include/exclude name filters against the default decoder set. An
/// empty `include` means "all defaults"; a non-empty one restricts to the
/// named subset first, and `exclude` is applied after that. Unknown names in
/// either list fail with a [`SetupError`] rather than being silently
/// ignored, since a typo in `--include`/`--exclude` would otherwise produce
/// a confusingly smaller decoder set.
pub fn select_decoder_names(default: &[&str], include: &[&str], exclude: &[&str]) -> Result<Vec<String>> {
    for name in include.iter().chain(exclude.iter()) {
        if !default.contains(name) {
            return Err(Box::new(SetupError::new(format!("unknown decoder name '{name}'"))));
        }
    }

    let selected: Vec<&str> = if include.is_empty() {
        default.to_vec()
    } else {
        default.iter().filter(|name| include.contains(name)).copied().collect()
    };

    Ok(selected
        .into_iter()
        .filter(|name| !exclude.contains(name))
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests_selection {
    use super::*;

    const DEFAULT: &[&str] = &["Ethernet", "Arp", "Tcp", "Udp"];

    #[test]
    fn test_empty_include_keeps_all_defaults_minus_exclude() {
        let selected = select_decoder_names(DEFAULT, &[], &["Arp"]).unwrap();
        assert_eq!(vec!["Ethernet", "Tcp", "Udp"], selected);
    }

    #[test]
    fn test_non_empty_include_restricts_before_exclude() {
        let selected = select_decoder_names(DEFAULT, &["Tcp", "Udp"], &["Udp"]).unwrap();
        assert_eq!(vec!["Tcp"], selected);
    }

    #[test]
    fn test_unknown_include_name_is_an_error() {
        assert!(select_decoder_names(DEFAULT, &["Ppp"], &[]).is_err());
    }

    #[test]
    fn test_unknown_exclude_name_is_an_error() {
        assert!(select_decoder_names(DEFAULT, &[], &["Ppp"]).is_err());
    }

    #[test]
    fn test_no_filters_returns_defaults_in_order() {
        let selected = select_decoder_names(DEFAULT, &[], &[]).unwrap();
        assert_eq!(vec!["Ethernet", "Arp", "Tcp", "Udp"], selected);
    }
}
