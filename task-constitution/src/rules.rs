//! The default rule set: the immutable baseline every `Constitution` ships
//! with, before any user-supplied additions are merged in.

use task_types::{ArgLimit, ArgPattern, Enforcement, Rule, Severity};

fn rule(
    id: &str,
    name: &str,
    severity: Severity,
    category: &str,
    description: &str,
    enforcement: Enforcement,
) -> Rule {
    Rule {
        id: id.to_string(),
        name: name.to_string(),
        severity,
        category: category.to_string(),
        description: description.to_string(),
        enforcement,
    }
}

fn arg_pattern(tool: &str, field: Option<&str>, pattern: &str) -> ArgPattern {
    ArgPattern {
        tool: tool.to_string(),
        field: field.map(str::to_string),
        pattern: pattern.to_string(),
    }
}

/// The frozen baseline rules. `Constitution::default()` starts from exactly
/// this set; user rules may only add to it (see `Constitution::with_user_rules`).
pub fn default_rules() -> Vec<Rule> {
    vec![
        rule(
            "SAFETY-001",
            "destructive shell command",
            Severity::Critical,
            "destructive-commands",
            "Blocks shell commands that destroy data or the host: recursive \
             root deletion, disk-wipe utilities, fork bombs, and shutdown/reboot.",
            Enforcement {
                arg_patterns: vec![
                    arg_pattern("shell_exec", None, r"rm\s+-rf\s+/(\s|$)"),
                    arg_pattern("shell_exec", None, r"\bmkfs\.\w+\b"),
                    arg_pattern("shell_exec", None, r"\bdd\s+if=/dev/(zero|random)\b.*of=/dev/"),
                    arg_pattern("shell_exec", None, r":\(\)\s*\{\s*:\|:&\s*\}\s*;\s*:"),
                    arg_pattern("shell_exec", None, r"\b(shutdown|reboot|halt|poweroff)\b"),
                ],
                ..Default::default()
            },
        ),
        rule(
            "SAFETY-002",
            "malware keyword",
            Severity::Critical,
            "malware",
            "Blocks tool calls whose arguments reference building or \
             deploying malware, ransomware, or a keylogger.",
            Enforcement {
                arg_patterns: vec![arg_pattern(
                    "shell_exec",
                    None,
                    r"\b(ransomware|keylogger|botnet|rootkit|trojan\s+payload)\b",
                )],
                ..Default::default()
            },
        ),
        rule(
            "SAFETY-003",
            "network attack tooling",
            Severity::Critical,
            "network-attack",
            "Blocks invocation of offensive network scanning/exploitation \
             tooling outside an authorized testing context.",
            Enforcement {
                blocked_tools: vec!["nmap_exec".to_string(), "metasploit_exec".to_string()],
                arg_patterns: vec![arg_pattern(
                    "shell_exec",
                    None,
                    r"\b(nmap\s+-(sS|sV|A)|msfconsole|sqlmap|hydra\s+-[lL])\b",
                )],
                ..Default::default()
            },
        ),
        rule(
            "SAFETY-004",
            "credential exfiltration via URL",
            Severity::Critical,
            "exfiltration",
            "Blocks HTTP requests whose URL query string carries an API key, \
             token, password, or secret.",
            Enforcement {
                arg_patterns: vec![arg_pattern(
                    "http_fetch",
                    Some("url"),
                    r"[?&](api[_-]?key|token|secret|password)=",
                )],
                ..Default::default()
            },
        ),
        rule(
            "SAFETY-005",
            "constitution tampering",
            Severity::Critical,
            "self-modification",
            "Blocks any file write targeting the constitution's own rule file.",
            Enforcement {
                arg_patterns: vec![arg_pattern(
                    "file_write",
                    Some("path"),
                    r"constitution.*\.(json|ya?ml|toml)$",
                )],
                ..Default::default()
            },
        ),
        rule(
            "SAFETY-006",
            "infinite loop pattern",
            Severity::Critical,
            "resource-abuse",
            "Blocks shell constructs that loop unconditionally with no exit \
             condition (`while true`, `for (;;)`).",
            Enforcement {
                arg_patterns: vec![
                    arg_pattern("shell_exec", None, r"while\s*\(\s*true\s*\)|while\s+true\b"),
                    arg_pattern("shell_exec", None, r"for\s*\(\s*;;\s*\)"),
                ],
                ..Default::default()
            },
        ),
        rule(
            "SAFETY-007",
            "impersonation",
            Severity::High,
            "impersonation",
            "Flags communications that claim to be from a named real person \
             or an official organizational account without disclosure.",
            Enforcement {
                arg_patterns: vec![arg_pattern(
                    "send_message",
                    Some("body"),
                    r"\bi\s+am\s+(the\s+)?(ceo|cfo|cto|president|your\s+manager)\b",
                )],
                ..Default::default()
            },
        ),
        rule(
            "SAFETY-008",
            "unauthorized external communication",
            Severity::High,
            "communication",
            "Flags outbound messages to recipients outside the task's own \
             channel/thread context.",
            Enforcement {
                arg_limits: vec![ArgLimit {
                    tool: "send_message".to_string(),
                    field: "recipient_count".to_string(),
                    max: 1.0,
                }],
                ..Default::default()
            },
        ),
        rule(
            "SAFETY-009",
            "AI self-identification",
            Severity::Medium,
            "disclosure",
            "Requires that, when asked directly, the assistant identify \
             itself as an AI rather than claim to be human.",
            Enforcement {
                output_patterns: vec![
                    r"\bi\s+am\s+(a\s+)?(real\s+)?human\b".to_string(),
                    r"\bi\s+am\s+not\s+an?\s+ai\b".to_string(),
                ],
                ..Default::default()
            },
        ),
    ]
}
