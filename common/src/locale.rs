//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Locale guessing from a host name's top level domain

/// Locale used when the domain gives no hint
pub const DEFAULT_LOCALE: &str = "en";

/// Guess a locale from the last label of `host`
pub fn guess_locale(host: &str) -> &'static str {
    let suffix = host
        .trim_end_matches('.')
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();

    match suffix.as_str() {
        "at" => "de_AT",
        "de" => "de_DE",
        "mx" => "es_MX",
        "es" => "es_ES",
        "it" => "it_IT",
        "fr" => "fr_FR",
        "uk" => "en_GB",
        "arpa" | "com" | "edu" | "gov" | "org" | "mil" => "en_US",
        _ => DEFAULT_LOCALE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_country_domains() {
        assert_eq!(guess_locale("host.example.at"), "de_AT");
        assert_eq!(guess_locale("www.example.DE"), "de_DE");
        assert_eq!(guess_locale("mail.example.co.uk."), "en_GB");
        assert_eq!(guess_locale("example.org"), "en_US");
    }

    #[test]
    fn test_addresses_fall_back() {
        assert_eq!(guess_locale("127.0.0.1"), DEFAULT_LOCALE);
        assert_eq!(guess_locale("::1"), DEFAULT_LOCALE);
        assert_eq!(guess_locale(""), DEFAULT_LOCALE);
    }
}
