//! Rule store and rule-source loader.
//!
//! A rule source is an ordered list of lines:
//!
//! ```text
//! # comment
//! - *.bad.example        # deny
//! + *.example            # allow
//! deny: 10.0.0.0/8
//! !192.168.             # unmarked: effect comes from `sense`, negated
//! ```
//!
//! Insertion order is file order and is significant: the engine stops at
//! the first matching rule.

use std::fs::OpenOptions;
use std::io::Read;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::error::{Result, RuleError};
use crate::models::{Effect, FilterRule};
use crate::pattern::Pattern;

/// Largest rule file the loader accepts (1 MiB).
pub const MAX_RULE_FILE_BYTES: u64 = 1024 * 1024;

/// Login name syntax enforced on exact user-name patterns.
pub const USER_NAME_SYNTAX: &str = r"^[a-z_]([a-z0-9_-]{0,31}|[a-z0-9_-]{0,30}\$)$";

static USER_NAME: OnceLock<Option<Regex>> = OnceLock::new();

/// How rule text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Effect of lines without a `+`/`-` marker.
    pub sense: Effect,
    /// Lower-case patterns before compiling them (host-valued items).
    pub fold_case: bool,
    /// Exact patterns must be valid login names (user-valued items).
    pub user_names: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            sense: Effect::Allow,
            fold_case: false,
            user_names: false,
        }
    }
}

/// Ordered, immutable-after-load sequence of filter rules.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RuleStore {
    rules: Vec<FilterRule>,
}

impl RuleStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse rule text. `origin` names the source in error messages.
    pub fn parse(text: &str, origin: &str, options: &ParseOptions) -> Result<Self> {
        let mut store = Self::new();
        store.append_text(text, origin, options)?;
        Ok(store)
    }

    /// Load a rule file from disk.
    ///
    /// The read is bounded by [`MAX_RULE_FILE_BYTES`]; the file is never
    /// written to.
    pub fn load(path: &Path, options: &ParseOptions) -> Result<Self> {
        let mut store = Self::new();
        store.append_file(path, options)?;
        Ok(store)
    }

    /// Append the rules of a file after the existing ones.
    pub fn append_file(&mut self, path: &Path, options: &ParseOptions) -> Result<()> {
        let text = read_bounded(path)?;
        let origin = path.display().to_string();
        let before = self.rules.len();
        self.append_text(&text, &origin, options)?;

        debug!(
            "loaded {} rules from {}",
            self.rules.len() - before,
            origin
        );
        Ok(())
    }

    /// Append the rules of a text block after the existing ones.
    pub fn append_text(&mut self, text: &str, origin: &str, options: &ParseOptions) -> Result<()> {
        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            if let Some(rule) = parse_line(raw, line, options).map_err(|reason| RuleError::Parse {
                origin: origin.to_string(),
                line,
                reason,
            })? {
                self.rules.push(rule);
            }
        }
        Ok(())
    }

    /// Append one pattern with an explicit effect.
    ///
    /// Used for inline rules passed as module arguments; `position` is
    /// recorded as the rule's line.
    pub fn append_pattern(
        &mut self,
        pattern: &str,
        effect: Effect,
        position: usize,
        options: &ParseOptions,
    ) -> Result<()> {
        let (negated, body) = split_negation(pattern.trim());
        let pattern = compile(body, options).map_err(|reason| RuleError::Parse {
            origin: "inline".to_string(),
            line: position,
            reason,
        })?;
        self.rules.push(FilterRule::new(pattern, effect, negated, position));
        Ok(())
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    /// Iterate rules in evaluation order.
    pub fn iter(&self) -> std::slice::Iter<'_, FilterRule> {
        self.rules.iter()
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true when no rules are configured.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl FromIterator<FilterRule> for RuleStore {
    fn from_iter<I: IntoIterator<Item = FilterRule>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a RuleStore {
    type Item = &'a FilterRule;
    type IntoIter = std::slice::Iter<'a, FilterRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

fn read_bounded(path: &Path) -> Result<String> {
    let io_err = |source| RuleError::Io {
        path: path.to_path_buf(),
        source,
    };

    // O_NONBLOCK keeps open() from waiting on a FIFO with no writer.
    let file = OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
        .map_err(io_err)?;
    if !file.metadata().map_err(io_err)?.is_file() {
        return Err(RuleError::NotAFile {
            path: path.to_path_buf(),
        });
    }

    let mut text = String::new();
    file.take(MAX_RULE_FILE_BYTES + 1)
        .read_to_string(&mut text)
        .map_err(io_err)?;

    if text.len() as u64 > MAX_RULE_FILE_BYTES {
        return Err(RuleError::TooLarge {
            path: path.to_path_buf(),
            max: MAX_RULE_FILE_BYTES,
        });
    }
    Ok(text)
}

/// Parse one line; `Ok(None)` for blank lines and comments.
fn parse_line(
    raw: &str,
    line: usize,
    options: &ParseOptions,
) -> std::result::Result<Option<FilterRule>, String> {
    let text = strip_comment(raw).trim();
    if text.is_empty() {
        return Ok(None);
    }

    let (effect, rest) = split_marker(text);
    let (negated, body) = split_negation(rest.trim_start());
    if body.is_empty() {
        return Err("missing pattern".to_string());
    }

    let pattern = compile(body, options)?;
    Ok(Some(FilterRule::new(
        pattern,
        effect.unwrap_or(options.sense),
        negated,
        line,
    )))
}

fn strip_comment(raw: &str) -> &str {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('#') {
        return "";
    }
    // Trailing comments need whitespace before the hash.
    match raw.find(" #").or_else(|| raw.find("\t#")) {
        Some(pos) => &raw[..pos],
        None => raw,
    }
}

fn split_marker(text: &str) -> (Option<Effect>, &str) {
    if let Some(rest) = text.strip_prefix('+') {
        return (Some(Effect::Allow), rest);
    }
    if let Some(rest) = text.strip_prefix('-') {
        return (Some(Effect::Deny), rest);
    }
    for (keyword, effect) in [("allow:", Effect::Allow), ("deny:", Effect::Deny)] {
        if let Some(head) = text.get(..keyword.len()) {
            if head.eq_ignore_ascii_case(keyword) {
                return (Some(effect), &text[keyword.len()..]);
            }
        }
    }
    (None, text)
}

fn split_negation(text: &str) -> (bool, &str) {
    match text.strip_prefix('!') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, text),
    }
}

fn compile(body: &str, options: &ParseOptions) -> std::result::Result<Pattern, String> {
    let body = if options.fold_case {
        body.to_lowercase()
    } else {
        body.to_string()
    };
    let pattern = Pattern::parse(&body)?;

    if options.user_names {
        if let Pattern::Exact(name) = &pattern {
            if !is_user_name(name) {
                return Err(format!("invalid user name '{}'", name));
            }
        }
    }
    Ok(pattern)
}

fn is_user_name(name: &str) -> bool {
    USER_NAME
        .get_or_init(|| Regex::new(USER_NAME_SYNTAX).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::io::Write;
    use std::os::unix::ffi::OsStrExt;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_parse_markers_and_sense() {
        let text = "+ *.example\n- 10.0.0.0/8\nallow: alice\nDENY: bob\nplain\n";
        let options = ParseOptions {
            sense: Effect::Deny,
            ..ParseOptions::default()
        };
        let store = RuleStore::parse(text, "inline", &options).unwrap();
        let effects: Vec<Effect> = store.iter().map(|r| r.effect).collect();
        assert_eq!(
            effects,
            vec![Effect::Allow, Effect::Deny, Effect::Allow, Effect::Deny, Effect::Deny]
        );
    }

    #[test]
    fn test_comments_and_blank_lines_ignored() {
        let text = "# header\n\n   \nalice # trailing\n\t# indented comment\n";
        let store = RuleStore::parse(text, "inline", &ParseOptions::default()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.rules()[0].line, 4);
        assert!(store.rules()[0].pattern.matches("alice"));
    }

    #[test]
    fn test_negation_marker() {
        let store = RuleStore::parse("- ! web?", "inline", &ParseOptions::default()).unwrap();
        let rule = &store.rules()[0];
        assert!(rule.negated);
        assert_eq!(rule.effect, Effect::Deny);
        assert_eq!(rule.apply("web1"), Some(Effect::Allow));
    }

    #[test]
    fn test_parse_error_carries_line() {
        let err = RuleStore::parse("alice\n+\n", "rules.conf", &ParseOptions::default()).unwrap_err();
        match err {
            RuleError::Parse { origin, line, .. } => {
                assert_eq!(origin, "rules.conf");
                assert_eq!(line, 2);
            }
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_fold_case() {
        let options = ParseOptions {
            fold_case: true,
            ..ParseOptions::default()
        };
        let store = RuleStore::parse("*.Example.COM", "inline", &options).unwrap();
        assert!(store.rules()[0].pattern.matches("host.example.com"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "- *.bad.example").unwrap();
        writeln!(file, "+ *.example").unwrap();

        let store = RuleStore::load(file.path(), &ParseOptions::default()).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = RuleStore::load(&dir.path().join("absent"), &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, RuleError::Io { .. }));
    }

    #[test]
    fn test_load_rejects_oversized_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let line = "# padding padding padding padding padding padding padding\n";
        let mut written = 0u64;
        while written <= MAX_RULE_FILE_BYTES {
            file.write_all(line.as_bytes()).unwrap();
            written += line.len() as u64;
        }
        file.flush().unwrap();

        let err = RuleStore::load(file.path(), &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, RuleError::TooLarge { .. }));
    }

    #[test]
    fn test_append_pattern_inline() {
        let mut store = RuleStore::new();
        store
            .append_pattern("!10.0.0.0/8", Effect::Allow, 3, &ParseOptions::default())
            .unwrap();
        let rule = &store.rules()[0];
        assert!(rule.negated);
        assert_eq!(rule.line, 3);
        assert!(store
            .append_pattern("", Effect::Deny, 4, &ParseOptions::default())
            .is_err());
    }

    #[test]
    fn test_load_fifo_fails_without_blocking() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.fifo");
        let c_path = CString::new(path.as_os_str().as_bytes()).unwrap();
        assert_eq!(unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) }, 0);

        let (tx, rx) = mpsc::channel();
        let fifo = path.clone();
        thread::spawn(move || {
            let _ = tx.send(RuleStore::load(&fifo, &ParseOptions::default()).map(|s| s.len()));
        });

        let result = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("loading a FIFO must return");
        assert!(matches!(result, Err(RuleError::NotAFile { .. })));
    }

    #[test]
    fn test_load_directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = RuleStore::load(dir.path(), &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, RuleError::NotAFile { .. }));
    }

    #[test]
    fn test_user_names_checked_for_exact_patterns() {
        let options = ParseOptions {
            user_names: true,
            ..ParseOptions::default()
        };
        let store = RuleStore::parse("- root
+ deploy-bot
+ svc$
+ adm*
", "users", &options).unwrap();
        assert_eq!(store.len(), 4);

        let err = RuleStore::parse("+ alice
+ Bob Smith
", "users", &options).unwrap_err();
        match err {
            RuleError::Parse { line, reason, .. } => {
                assert_eq!(line, 2);
                assert!(reason.contains("invalid user name"), "{}", reason);
            }
            other => panic!("Expected Parse error, got {:?}", other),
        }

        let mut inline = RuleStore::new();
        assert!(inline.append_pattern("9lives", Effect::Allow, 1, &options).is_err());
        assert!(inline.append_pattern("!_backup", Effect::Deny, 2, &options).is_ok());
    }

    #[test]
    fn test_user_name_check_off_by_default() {
        let store = RuleStore::parse("+ Bob Smith", "hosts", &ParseOptions::default()).unwrap();
        assert_eq!(store.len(), 1);
    }
}
