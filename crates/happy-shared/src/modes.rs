use serde::{Deserialize, Serialize};
use ts_rs::TS;

// --- Permission Modes ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum PermissionMode {
    #[default]
    #[serde(rename = "default")]
    Default,
    #[serde(rename = "acceptEdits")]
    AcceptEdits,
    #[serde(rename = "bypassPermissions")]
    BypassPermissions,
    #[serde(rename = "plan")]
    Plan,
    #[serde(rename = "read-only")]
    ReadOnly,
    #[serde(rename = "safe-yolo")]
    SafeYolo,
    #[serde(rename = "yolo")]
    Yolo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ModelMode {
    #[default]
    #[serde(rename = "default")]
    Default,
    #[serde(rename = "adaptiveUsage")]
    AdaptiveUsage,
    #[serde(rename = "sonnet")]
    Sonnet,
    #[serde(rename = "opus")]
    Opus,
    #[serde(rename = "gpt-5.1-codex-max-xhigh")]
    CodexMaxXHigh,
    #[serde(rename = "gpt-5.1-codex-max-high")]
    CodexMaxHigh,
    #[serde(rename = "gpt-5.1-codex-max-medium")]
    CodexMaxMedium,
    #[serde(rename = "gpt-5.1-codex-high")]
    CodexHigh,
    #[serde(rename = "gpt-5.1-codex-medium")]
    CodexMedium,
    #[serde(rename = "gpt-5.1-codex-low")]
    CodexLow,
    #[serde(rename = "gpt-5.1-codex-mini")]
    CodexMini,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
#[ts(rename_all = "lowercase")]
pub enum AgentFlavor {
    #[default]
    Claude,
    Codex,
    Gemini,
}

// --- Constants ---

pub const CLAUDE_PERMISSION_MODES: &[PermissionMode] = &[
    PermissionMode::Default,
    PermissionMode::AcceptEdits,
    PermissionMode::Plan,
    PermissionMode::BypassPermissions,
];

pub const CODEX_PERMISSION_MODES: &[PermissionMode] = &[
    PermissionMode::Default,
    PermissionMode::ReadOnly,
    PermissionMode::SafeYolo,
    PermissionMode::Yolo,
];

pub const CLAUDE_MODEL_MODES: &[ModelMode] = &[
    ModelMode::Default,
    ModelMode::AdaptiveUsage,
    ModelMode::Sonnet,
    ModelMode::Opus,
];

pub const CODEX_MODEL_MODES: &[ModelMode] = &[
    ModelMode::CodexMaxXHigh,
    ModelMode::CodexMaxHigh,
    ModelMode::CodexMaxMedium,
    ModelMode::CodexHigh,
    ModelMode::CodexMedium,
    ModelMode::CodexLow,
    ModelMode::CodexMini,
];

impl PermissionMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Default => "Default",
            Self::AcceptEdits => "Accept Edits",
            Self::Plan => "Plan",
            Self::BypassPermissions => "Yolo",
            Self::ReadOnly => "Read-only",
            Self::SafeYolo => "Safe YOLO",
            Self::Yolo => "YOLO",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Default => "Ask for permissions",
            Self::AcceptEdits => "Auto-approve edits",
            Self::Plan => "Plan before executing",
            Self::BypassPermissions => "Skip all permissions",
            Self::ReadOnly => "Read-only mode",
            Self::SafeYolo => "Safe YOLO mode",
            Self::Yolo => "YOLO mode",
        }
    }

    /// Next mode in the selector cycle. Modes outside the cycle restart it.
    pub fn next(self) -> Self {
        self.next_for(AgentFlavor::Claude)
    }

    pub fn next_for(self, flavor: AgentFlavor) -> Self {
        let modes = permission_modes_for_flavor(flavor);
        match modes.iter().position(|m| *m == self) {
            Some(i) => modes[(i + 1) % modes.len()],
            None => Self::Default,
        }
    }
}

impl ModelMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Default => "Default",
            Self::AdaptiveUsage => "Adaptive Usage",
            Self::Sonnet => "Sonnet",
            Self::Opus => "Opus",
            Self::CodexMaxXHigh => "GPT-5.1 Codex Max (xhigh)",
            Self::CodexMaxHigh => "GPT-5.1 Codex Max (high)",
            Self::CodexMaxMedium => "GPT-5.1 Codex Max (medium)",
            Self::CodexHigh => "GPT-5.1 Codex (high)",
            Self::CodexMedium => "GPT-5.1 Codex (medium)",
            Self::CodexLow => "GPT-5.1 Codex (low)",
            Self::CodexMini => "GPT-5.1 Codex Mini",
        }
    }
}

impl AgentFlavor {
    /// Interpret the free-form `flavor` string carried in session metadata.
    pub fn from_metadata(flavor: Option<&str>) -> Self {
        match flavor {
            Some("codex") => Self::Codex,
            Some("gemini") => Self::Gemini,
            _ => Self::Claude,
        }
    }
}

pub fn permission_modes_for_flavor(flavor: AgentFlavor) -> &'static [PermissionMode] {
    match flavor {
        AgentFlavor::Codex | AgentFlavor::Gemini => CODEX_PERMISSION_MODES,
        AgentFlavor::Claude => CLAUDE_PERMISSION_MODES,
    }
}

pub fn is_permission_mode_allowed_for_flavor(mode: PermissionMode, flavor: AgentFlavor) -> bool {
    permission_modes_for_flavor(flavor).contains(&mode)
}

pub fn model_modes_for_flavor(flavor: AgentFlavor) -> &'static [ModelMode] {
    match flavor {
        AgentFlavor::Codex => CODEX_MODEL_MODES,
        AgentFlavor::Gemini => &[],
        AgentFlavor::Claude => CLAUDE_MODEL_MODES,
    }
}

pub fn is_model_mode_allowed_for_flavor(mode: ModelMode, flavor: AgentFlavor) -> bool {
    model_modes_for_flavor(flavor).contains(&mode)
}

// --- Tests ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::parse;
    use serde_json::json;

    #[test]
    fn permission_mode_wire_names() {
        assert_eq!(
            serde_json::to_string(&PermissionMode::AcceptEdits).unwrap(),
            "\"acceptEdits\""
        );
        assert_eq!(
            serde_json::to_string(&PermissionMode::ReadOnly).unwrap(),
            "\"read-only\""
        );
        assert_eq!(
            serde_json::to_string(&ModelMode::CodexMini).unwrap(),
            "\"gpt-5.1-codex-mini\""
        );
    }

    #[test]
    fn permission_mode_cycle() {
        let mut mode = PermissionMode::Default;
        let mut seen = vec![mode];
        for _ in 0..4 {
            mode = mode.next();
            seen.push(mode);
        }
        assert_eq!(
            seen,
            vec![
                PermissionMode::Default,
                PermissionMode::AcceptEdits,
                PermissionMode::Plan,
                PermissionMode::BypassPermissions,
                PermissionMode::Default,
            ]
        );
        assert_eq!(PermissionMode::SafeYolo.next(), PermissionMode::Default);
    }

    #[test]
    fn flavor_mode_tables() {
        assert!(is_permission_mode_allowed_for_flavor(
            PermissionMode::Plan,
            AgentFlavor::Claude
        ));
        assert!(!is_permission_mode_allowed_for_flavor(
            PermissionMode::Plan,
            AgentFlavor::Codex
        ));
        assert!(is_permission_mode_allowed_for_flavor(
            PermissionMode::Yolo,
            AgentFlavor::Gemini
        ));
        assert!(is_model_mode_allowed_for_flavor(
            ModelMode::CodexLow,
            AgentFlavor::Codex
        ));
        assert!(!is_model_mode_allowed_for_flavor(
            ModelMode::Opus,
            AgentFlavor::Gemini
        ));
    }

    #[test]
    fn flavor_from_metadata_defaults_to_claude() {
        assert_eq!(AgentFlavor::from_metadata(None), AgentFlavor::Claude);
        assert_eq!(AgentFlavor::from_metadata(Some("codex")), AgentFlavor::Codex);
        assert_eq!(AgentFlavor::from_metadata(Some("unknown")), AgentFlavor::Claude);
    }

    #[test]
    fn unknown_literal_is_rejected() {
        let err = parse::<PermissionMode>(&json!("turbo")).unwrap_err();
        assert!(err.path.is_root());
        assert!(err.message.contains("unknown variant `turbo`"));
        assert!(parse::<PermissionMode>(&json!(3)).is_err());
        assert_eq!(parse::<ModelMode>(&json!("opus")).unwrap(), ModelMode::Opus);
    }

    #[test]
    fn labels_follow_the_selector() {
        assert_eq!(PermissionMode::BypassPermissions.label(), "Yolo");
        assert_eq!(PermissionMode::ReadOnly.label(), "Read-only");
        assert_eq!(PermissionMode::SafeYolo.label(), "Safe YOLO");
        assert_eq!(PermissionMode::Yolo.label(), "YOLO");
        assert_eq!(PermissionMode::Yolo.description(), "YOLO mode");
    }
}
