//! Pattern syntax and matching.
//!
//! | Form | Example | Matches |
//! |------|---------|---------|
//! | Address | `192.0.2.7`, `::1` | the same IP address |
//! | Network | `10.0.0.0/8` | any address inside the net |
//! | Range | `10.0.0.5-10.0.0.9` | any address between the bounds, inclusive |
//! | Wildcard | `*.example.com`, `host?` | `*` any run, `?` one character |
//! | Prefix | `192.168.` | IPv4 candidates whose leading octets are the pattern |
//! | Suffix | `.example.com` | candidates ending with the pattern |
//! | Exact | `alice` | byte-equal candidates |
//!
//! Address forms and prefixes never match a candidate that is not an IP
//! literal. IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) are treated as the
//! IPv4 address they carry, in patterns and candidates alike.

use std::net::IpAddr;

use ipnet::{IpNet, Ipv4Net};
use regex::Regex;
use serde::{Serialize, Serializer};

/// A compiled rule pattern.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Single IP address.
    Address(IpAddr),
    /// CIDR network.
    Network(IpNet),
    /// Inclusive address range within one family.
    Range {
        /// Lowest address in the range.
        lower: IpAddr,
        /// Highest address in the range.
        upper: IpAddr,
    },
    /// Glob with `*` and `?`, anchored at both ends.
    Wildcard {
        /// Pattern as written.
        glob: String,
        /// Compiled form of `glob`.
        regex: Regex,
    },
    /// Leading IPv4 octets, written with a trailing dot.
    Prefix(String),
    /// Trailing part of the candidate, written with a leading dot.
    Suffix(String),
    /// Whole candidate.
    Exact(String),
}

impl Pattern {
    /// Compile a pattern from its textual form.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the text looks like an address
    /// form but is malformed, or is empty.
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let text = text.trim();
        if text.is_empty() {
            return Err("empty pattern".to_string());
        }

        if let Some((addr, _)) = text.split_once('/') {
            if addr.parse::<IpAddr>().is_ok() {
                let net = text
                    .parse::<IpNet>()
                    .map_err(|_| format!("invalid network '{}'", text))?;
                return canonical_net(net).map(Pattern::Network);
            }
        }

        if let Some((lower, upper)) = text.split_once('-') {
            if let (Ok(lower), Ok(upper)) = (lower.parse::<IpAddr>(), upper.parse::<IpAddr>()) {
                let (lower, upper) = (lower.to_canonical(), upper.to_canonical());
                if lower.is_ipv4() != upper.is_ipv4() {
                    return Err(format!("range '{}' mixes address families", text));
                }
                if lower > upper {
                    return Err(format!("range '{}' has lower bound above upper bound", text));
                }
                return Ok(Pattern::Range { lower, upper });
            }
        }

        if let Ok(addr) = text.parse::<IpAddr>() {
            return Ok(Pattern::Address(addr.to_canonical()));
        }

        if text.contains(['*', '?']) {
            return compile_glob(text).map(|regex| Pattern::Wildcard {
                glob: text.to_string(),
                regex,
            });
        }

        if text.len() > 1 && text.ends_with('.') {
            return check_octet_prefix(text).map(|()| Pattern::Prefix(text.to_string()));
        }
        if text.len() > 1 && text.starts_with('.') {
            return Ok(Pattern::Suffix(text.to_string()));
        }

        Ok(Pattern::Exact(text.to_string()))
    }

    /// Test a candidate against this pattern.
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Pattern::Address(addr) => ip_forms(candidate).is_some_and(|ips| ips.contains(addr)),
            Pattern::Network(net) => {
                ip_forms(candidate).is_some_and(|ips| ips.iter().any(|ip| net.contains(ip)))
            }
            Pattern::Range { lower, upper } => ip_forms(candidate)
                .is_some_and(|ips| ips.iter().any(|ip| lower <= ip && ip <= upper)),
            Pattern::Wildcard { regex, .. } => regex.is_match(candidate),
            Pattern::Prefix(prefix) => ip_forms(candidate).is_some_and(|[_, ip]| {
                ip.is_ipv4() && ip.to_string().starts_with(prefix.as_str())
            }),
            Pattern::Suffix(suffix) => candidate.ends_with(suffix.as_str()),
            Pattern::Exact(exact) => candidate == exact,
        }
    }
}

/// The candidate as written and in canonical form, if it is an IP literal.
fn ip_forms(candidate: &str) -> Option<[IpAddr; 2]> {
    candidate
        .parse::<IpAddr>()
        .ok()
        .map(|ip| [ip, ip.to_canonical()])
}

/// IPv4-mapped networks of /96 or longer become the IPv4 network they cover.
fn canonical_net(net: IpNet) -> std::result::Result<IpNet, String> {
    let IpNet::V6(v6) = net else {
        return Ok(net);
    };
    match v6.addr().to_ipv4_mapped() {
        Some(v4) if v6.prefix_len() >= 96 => Ipv4Net::new(v4, v6.prefix_len() - 96)
            .map(IpNet::V4)
            .map_err(|e| format!("invalid network '{}': {}", net, e)),
        _ => Ok(net),
    }
}

/// One to three decimal octets, each followed by a dot.
fn check_octet_prefix(text: &str) -> std::result::Result<(), String> {
    let octets: Vec<&str> = text[..text.len() - 1].split('.').collect();
    let valid = octets.len() <= 3
        && octets.iter().all(|octet| {
            !octet.is_empty()
                && octet.bytes().all(|b| b.is_ascii_digit())
                && (*octet == "0" || !octet.starts_with('0'))
                && octet.parse::<u8>().is_ok()
        });

    if valid {
        Ok(())
    } else {
        Err(format!(
            "'{}': a trailing dot is only allowed after IPv4 octets, as in '192.168.'",
            text
        ))
    }
}

fn compile_glob(glob: &str) -> std::result::Result<Regex, String> {
    let mut source = String::with_capacity(glob.len() * 2 + 6);
    source.push_str("(?s)^");
    for c in glob.chars() {
        match c {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            other => source.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    source.push('$');

    Regex::new(&source).map_err(|e| format!("invalid wildcard '{}': {}", glob, e))
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pattern::Address(addr) => write!(f, "{}", addr),
            Pattern::Network(net) => write!(f, "{}", net),
            Pattern::Range { lower, upper } => write!(f, "{}-{}", lower, upper),
            Pattern::Wildcard { glob, .. } => write!(f, "{}", glob),
            Pattern::Prefix(text) | Pattern::Suffix(text) | Pattern::Exact(text) => {
                write!(f, "{}", text)
            }
        }
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert!(matches!(Pattern::parse("192.0.2.7"), Ok(Pattern::Address(_))));
        assert!(matches!(Pattern::parse("10.0.0.0/8"), Ok(Pattern::Network(_))));
        assert!(matches!(Pattern::parse("10.0.0.5-10.0.0.9"), Ok(Pattern::Range { .. })));
        assert!(matches!(Pattern::parse("*.example.com"), Ok(Pattern::Wildcard { .. })));
        assert!(matches!(Pattern::parse("192.168."), Ok(Pattern::Prefix(_))));
        assert!(matches!(Pattern::parse(".example.com"), Ok(Pattern::Suffix(_))));
        assert!(matches!(Pattern::parse("alice"), Ok(Pattern::Exact(_))));
    }

    #[test]
    fn test_parse_rejects_malformed_address_forms() {
        assert!(Pattern::parse("10.0.0.0/33").is_err());
        assert!(Pattern::parse("10.0.0.9-10.0.0.5").is_err());
        assert!(Pattern::parse("10.0.0.1-::1").is_err());
        assert!(Pattern::parse("   ").is_err());
    }

    #[test]
    fn test_hyphenated_hostname_is_not_a_range() {
        let pattern = Pattern::parse("web-01.example.com").unwrap();
        assert!(matches!(pattern, Pattern::Exact(_)));
        assert!(pattern.matches("web-01.example.com"));
    }

    #[test]
    fn test_tty_path_is_not_a_network() {
        let pattern = Pattern::parse("/dev/pts/0").unwrap();
        assert!(matches!(pattern, Pattern::Exact(_)));
    }

    #[test]
    fn test_address_match() {
        let pattern = Pattern::parse("::1").unwrap();
        assert!(pattern.matches("0:0:0:0:0:0:0:1"));
        assert!(!pattern.matches("localhost"));
    }

    #[test]
    fn test_ipv4_mapped_candidate() {
        let pattern = Pattern::parse("192.0.2.0/24").unwrap();
        assert!(pattern.matches("::ffff:192.0.2.10"));
    }

    #[test]
    fn test_network_match() {
        let pattern = Pattern::parse("10.0.0.0/8").unwrap();
        assert!(pattern.matches("10.200.1.1"));
        assert!(!pattern.matches("11.0.0.1"));
        assert!(!pattern.matches("ten.example"));
    }

    #[test]
    fn test_range_match_is_inclusive() {
        let pattern = Pattern::parse("10.0.0.5-10.0.0.9").unwrap();
        assert!(pattern.matches("10.0.0.5"));
        assert!(pattern.matches("10.0.0.9"));
        assert!(!pattern.matches("10.0.0.10"));
        assert!(!pattern.matches("::1"));
    }

    #[test]
    fn test_wildcard_is_anchored() {
        let pattern = Pattern::parse("*.example").unwrap();
        assert!(pattern.matches("host.example"));
        assert!(!pattern.matches("host.example.org"));
        assert!(!pattern.matches("example"));

        let single = Pattern::parse("web?").unwrap();
        assert!(single.matches("web1"));
        assert!(!single.matches("web12"));
    }

    #[test]
    fn test_wildcard_escapes_regex_metacharacters() {
        let pattern = Pattern::parse("a+b.*").unwrap();
        assert!(pattern.matches("a+b.c"));
        assert!(!pattern.matches("aab.c"));
        assert!(!pattern.matches("a+bxc"));
    }

    #[test]
    fn test_prefix_and_suffix() {
        assert!(Pattern::parse("192.168.").unwrap().matches("192.168.4.4"));
        assert!(!Pattern::parse("192.168.").unwrap().matches("192.1680.4.4"));
        assert!(Pattern::parse(".example.com").unwrap().matches("mail.example.com"));
        assert!(!Pattern::parse(".example.com").unwrap().matches("example.com"));
    }

    #[test]
    fn test_display_round_trips_source() {
        for text in ["10.0.0.0/8", "*.example", ".example.com", "alice"] {
            assert_eq!(Pattern::parse(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn test_prefix_only_matches_ip_literals() {
        let pattern = Pattern::parse("10.1.").unwrap();
        assert!(pattern.matches("10.1.2.3"));
        assert!(pattern.matches("::ffff:10.1.2.3"));
        assert!(!pattern.matches("10.10.2.3"));
        assert!(!pattern.matches("10.1.attacker.example"));
    }

    #[test]
    fn test_trailing_dot_host_name_rejected() {
        assert!(Pattern::parse("host.example.com.").is_err());
        assert!(Pattern::parse("10.1.2.3.4.").is_err());
        assert!(Pattern::parse("300.").is_err());
        assert!(Pattern::parse("010.").is_err());
        assert!(Pattern::parse("0.").is_ok());
    }

    #[test]
    fn test_mapped_network_covers_ipv4_candidates() {
        let pattern = Pattern::parse("::ffff:192.0.2.0/120").unwrap();
        assert!(matches!(pattern, Pattern::Network(IpNet::V4(_))));
        assert!(pattern.matches("::ffff:192.0.2.5"));
        assert!(pattern.matches("192.0.2.5"));
        assert!(!pattern.matches("192.0.3.5"));
    }

    #[test]
    fn test_short_mapped_network_still_matches_raw_candidates() {
        let pattern = Pattern::parse("::ffff:0.0.0.0/80").unwrap();
        assert!(pattern.matches("::ffff:192.0.2.5"));
    }

    #[test]
    fn test_mapped_range_bounds() {
        let pattern = Pattern::parse("::ffff:192.0.2.1-::ffff:192.0.2.9").unwrap();
        assert!(pattern.matches("::ffff:192.0.2.5"));
        assert!(pattern.matches("192.0.2.9"));
        assert!(!pattern.matches("192.0.2.10"));

        let mixed = Pattern::parse("::ffff:192.0.2.1-192.0.2.9").unwrap();
        assert!(mixed.matches("192.0.2.3"));
    }
}
