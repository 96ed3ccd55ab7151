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

//! Connection filters applied before a session is created

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

/// Name that disables filtering
pub const NO_FILTER: &str = "none";

/// Decides whether a peer may connect
pub trait ConnectionFilter: Send + Sync + fmt::Debug {
    fn is_allowed(&self, address: &IpAddr) -> bool;
}

/// Accepts loopback peers only
#[derive(Debug, Default)]
pub struct LoopbackFilter;

impl ConnectionFilter for LoopbackFilter {
    fn is_allowed(&self, address: &IpAddr) -> bool {
        address.is_loopback()
    }
}

/// Accepts loopback, private and link-local peers
#[derive(Debug, Default)]
pub struct PrivateNetworkFilter;

impl ConnectionFilter for PrivateNetworkFilter {
    fn is_allowed(&self, address: &IpAddr) -> bool {
        match address {
            IpAddr::V4(v4) => v4.is_loopback() || v4.is_private() || v4.is_link_local(),
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => self.is_allowed(&IpAddr::V4(v4)),
                None => {
                    let first = v6.segments()[0];
                    // fc00::/7 unique local, fe80::/10 link local
                    v6.is_loopback() || (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
                }
            },
        }
    }
}

/// Resolve a configured filter name.
///
/// `Ok(None)` means no filtering; `Err` carries the unknown name.
pub fn connection_filter(name: Option<&str>) -> Result<Option<Arc<dyn ConnectionFilter>>, String> {
    let Some(name) = name.map(str::trim).filter(|name| !name.is_empty()) else {
        return Ok(None);
    };
    match name.to_ascii_lowercase().as_str() {
        NO_FILTER => Ok(None),
        "loopback" => Ok(Some(Arc::new(LoopbackFilter))),
        "private" => Ok(Some(Arc::new(PrivateNetworkFilter))),
        _ => Err(name.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(text: &str) -> IpAddr {
        text.parse().unwrap()
    }

    #[test]
    fn test_loopback_filter() {
        let filter = LoopbackFilter;
        assert!(filter.is_allowed(&ip("127.0.0.1")));
        assert!(filter.is_allowed(&ip("::1")));
        assert!(!filter.is_allowed(&ip("192.168.1.10")));
    }

    #[test]
    fn test_private_filter() {
        let filter = PrivateNetworkFilter;
        assert!(filter.is_allowed(&ip("10.1.2.3")));
        assert!(filter.is_allowed(&ip("172.16.0.1")));
        assert!(filter.is_allowed(&ip("192.168.0.1")));
        assert!(filter.is_allowed(&ip("169.254.3.4")));
        assert!(filter.is_allowed(&ip("fd12::1")));
        assert!(filter.is_allowed(&ip("fe80::1")));
        assert!(filter.is_allowed(&ip("::ffff:10.0.0.1")));
        assert!(!filter.is_allowed(&ip("8.8.8.8")));
        assert!(!filter.is_allowed(&ip("2001:db8::1")));
    }

    #[test]
    fn test_filter_names() {
        assert!(connection_filter(None).unwrap().is_none());
        assert!(connection_filter(Some("none")).unwrap().is_none());
        assert!(connection_filter(Some(" ")).unwrap().is_none());
        assert!(connection_filter(Some("Loopback")).unwrap().is_some());
        assert!(connection_filter(Some("private")).unwrap().is_some());
        assert_eq!(connection_filter(Some("geoip")).unwrap_err(), "geoip");
    }
}
