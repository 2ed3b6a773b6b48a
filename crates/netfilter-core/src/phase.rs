//! Lifecycle phases and the host result-code vocabulary.

use netfilter_rules::Verdict;
use serde::{Deserialize, Serialize};

use crate::config::OnErr;

/// The six call-outs a host may make into the module.
///
/// The host sequences these; the module assumes nothing about which
/// phases ran before.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// `pam_sm_authenticate`
    Authenticate,
    /// `pam_sm_setcred`
    Setcred,
    /// `pam_sm_acct_mgmt`
    AcctMgmt,
    /// `pam_sm_open_session`
    OpenSession,
    /// `pam_sm_close_session`
    CloseSession,
    /// `pam_sm_chauthtok`
    Chauthtok,
}

impl Phase {
    /// All phases in descriptor slot order.
    pub const ALL: [Phase; 6] = [
        Phase::Authenticate,
        Phase::Setcred,
        Phase::AcctMgmt,
        Phase::OpenSession,
        Phase::CloseSession,
        Phase::Chauthtok,
    ];

    /// Whether this phase consults the rule store.
    ///
    /// Only `authenticate` and `setcred` do; the others always answer
    /// [`ResultCode::Ignore`].
    pub fn performs_matching(self) -> bool {
        matches!(self, Phase::Authenticate | Phase::Setcred)
    }

    /// Exported symbol name of the entry point.
    pub fn symbol(self) -> &'static str {
        match self {
            Phase::Authenticate => "pam_sm_authenticate",
            Phase::Setcred => "pam_sm_setcred",
            Phase::AcctMgmt => "pam_sm_acct_mgmt",
            Phase::OpenSession => "pam_sm_open_session",
            Phase::CloseSession => "pam_sm_close_session",
            Phase::Chauthtok => "pam_sm_chauthtok",
        }
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let name = s.strip_prefix("pam_sm_").unwrap_or(s);
        match name {
            "authenticate" | "auth" => Ok(Phase::Authenticate),
            "setcred" => Ok(Phase::Setcred),
            "acct_mgmt" | "account" => Ok(Phase::AcctMgmt),
            "open_session" => Ok(Phase::OpenSession),
            "close_session" => Ok(Phase::CloseSession),
            "chauthtok" | "password" => Ok(Phase::Chauthtok),
            other => Err(format!("unknown phase '{}'", other)),
        }
    }
}

/// Result codes returned to the host.
///
/// Discriminants are the Linux-PAM values from `<security/_pam_types.h>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ResultCode {
    /// `PAM_SUCCESS`
    Success = 0,
    /// `PAM_PERM_DENIED`
    PermissionDenied = 6,
    /// `PAM_IGNORE`: the module has no opinion for this call.
    Ignore = 25,
}

impl ResultCode {
    /// Integer handed back across the ABI.
    #[inline]
    pub fn as_raw(self) -> i32 {
        self as i32
    }

    /// Map a verdict, resolving `Indeterminate` through `onerr`.
    pub fn for_verdict(verdict: Verdict, onerr: OnErr) -> Self {
        match verdict {
            Verdict::Allow => ResultCode::Success,
            Verdict::Deny => ResultCode::PermissionDenied,
            Verdict::Indeterminate => onerr.result_code(),
        }
    }

    /// Symbolic PAM name, for logs and the CLI.
    pub fn name(self) -> &'static str {
        match self {
            ResultCode::Success => "PAM_SUCCESS",
            ResultCode::PermissionDenied => "PAM_PERM_DENIED",
            ResultCode::Ignore => "PAM_IGNORE",
        }
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_values_match_linux_pam() {
        assert_eq!(ResultCode::Success.as_raw(), 0);
        assert_eq!(ResultCode::PermissionDenied.as_raw(), 6);
        assert_eq!(ResultCode::Ignore.as_raw(), 25);
    }

    #[test]
    fn test_verdict_mapping() {
        assert_eq!(ResultCode::for_verdict(Verdict::Allow, OnErr::Fail), ResultCode::Success);
        assert_eq!(
            ResultCode::for_verdict(Verdict::Deny, OnErr::Succeed),
            ResultCode::PermissionDenied
        );
        assert_eq!(
            ResultCode::for_verdict(Verdict::Indeterminate, OnErr::Succeed),
            ResultCode::Success
        );
        assert_eq!(
            ResultCode::for_verdict(Verdict::Indeterminate, OnErr::default()),
            ResultCode::PermissionDenied
        );
    }

    #[test]
    fn test_every_code_is_produced() {
        let mut produced = std::collections::HashSet::new();
        for verdict in [Verdict::Allow, Verdict::Deny, Verdict::Indeterminate] {
            for onerr in [OnErr::Succeed, OnErr::Fail, OnErr::Ignore] {
                produced.insert(ResultCode::for_verdict(verdict, onerr));
            }
        }
        let expected: std::collections::HashSet<ResultCode> =
            [ResultCode::Success, ResultCode::PermissionDenied, ResultCode::Ignore].into();
        assert_eq!(produced, expected);
    }

    #[test]
    fn test_only_two_phases_match() {
        let matching: Vec<Phase> = Phase::ALL.into_iter().filter(|p| p.performs_matching()).collect();
        assert_eq!(matching, vec![Phase::Authenticate, Phase::Setcred]);
    }

    #[test]
    fn test_phase_from_str() {
        assert_eq!("pam_sm_acct_mgmt".parse::<Phase>(), Ok(Phase::AcctMgmt));
        assert_eq!("auth".parse::<Phase>(), Ok(Phase::Authenticate));
        assert!("reboot".parse::<Phase>().is_err());
    }
}
