use gateflow_core::AgentRole;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Paths excluded from conflict detection: shared type definitions, utility
/// directories, and project-level config every agent may touch.
const SHARED_PATHS: [&str; 6] = [
    "src/types/**",
    "src/utils/**",
    "src/lib/**",
    "package.json",
    "tsconfig.json",
    ".env.example",
];

/// Default file ownership per agent role, used when a spawn request does
/// not declare its own.
pub fn default_file_ownership(role: AgentRole) -> Vec<&'static str> {
    match role {
        AgentRole::ProductManager => vec!["docs/prd/**", "docs/change-requests.md"],
        AgentRole::Architect => vec!["docs/architecture/**", "specs/**"],
        AgentRole::UxDesigner => vec!["designs/**", "docs/design/**"],
        AgentRole::FrontendDeveloper => vec![
            "src/components/**",
            "src/pages/**",
            "src/styles/**",
            "public/**",
        ],
        AgentRole::BackendDeveloper => vec![
            "src/api/**",
            "src/server/**",
            "src/services/**",
            "prisma/**",
        ],
        AgentRole::MlEngineer => vec!["src/ml/**", "models/**", "notebooks/**"],
        AgentRole::PromptEngineer => vec!["src/prompts/**", "docs/prompts/**"],
        AgentRole::QaEngineer => vec!["tests/**", "e2e/**"],
        AgentRole::ModelEvaluator => vec!["evals/**", "tests/model/**"],
        AgentRole::SecurityEngineer => vec!["docs/security/**", "security/**"],
        AgentRole::DevOpsEngineer => vec![
            "infra/**",
            "deploy/**",
            ".github/workflows/**",
            "Dockerfile",
        ],
        AgentRole::AiOps => vec!["infra/ml/**", "deploy/models/**"],
    }
}

/// One agent's declared file ownership in a parallel-spawn request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOwnership {
    /// Agent display name (e.g. `"Frontend Developer"`).
    pub agent_name: String,
    /// Glob patterns the agent intends to write. Empty means "use the
    /// role's defaults".
    #[serde(default)]
    pub file_ownership: Vec<String>,
}

/// A detected pairwise ownership conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipConflict {
    /// First agent of the conflicting pair.
    pub agent_a: String,
    /// Second agent of the conflicting pair.
    pub agent_b: String,
    /// The overlapping path patterns.
    pub conflicting_paths: Vec<String>,
}

/// Result of a parallel-spawn conflict check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelCheck {
    /// Whether the whole set may run concurrently.
    pub can_spawn_parallel: bool,
    /// Every conflicting pair, empty when parallel execution is safe.
    pub conflicts: Vec<OwnershipConflict>,
}

/// Detects file-ownership collisions across a set of agents that are about
/// to run in parallel.
///
/// Two patterns conflict when their literal prefixes overlap (one is a
/// path-prefix of the other) or one pattern matches the other's literal
/// prefix. Patterns under the shared-path allowlist never conflict.
pub fn check_parallel_spawn_conflicts(agents: &[AgentOwnership]) -> ParallelCheck {
    let resolved: Vec<(String, Vec<String>)> = agents
        .iter()
        .map(|a| {
            let ownership = if a.file_ownership.is_empty() {
                a.agent_name
                    .parse::<AgentRole>()
                    .map(|role| {
                        default_file_ownership(role)
                            .into_iter()
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default()
            } else {
                a.file_ownership.clone()
            };
            (a.agent_name.clone(), ownership)
        })
        .collect();

    let mut conflicts = Vec::new();
    for i in 0..resolved.len() {
        for j in (i + 1)..resolved.len() {
            let (name_a, paths_a) = &resolved[i];
            let (name_b, paths_b) = &resolved[j];
            let mut overlapping = Vec::new();
            for pa in paths_a {
                if is_shared(pa) {
                    continue;
                }
                for pb in paths_b {
                    if is_shared(pb) {
                        continue;
                    }
                    if patterns_overlap(pa, pb) {
                        overlapping.push(format!("{pa} <-> {pb}"));
                    }
                }
            }
            if !overlapping.is_empty() {
                debug!(agent_a = %name_a, agent_b = %name_b, "ownership conflict detected");
                conflicts.push(OwnershipConflict {
                    agent_a: name_a.clone(),
                    agent_b: name_b.clone(),
                    conflicting_paths: overlapping,
                });
            }
        }
    }

    ParallelCheck {
        can_spawn_parallel: conflicts.is_empty(),
        conflicts,
    }
}

/// The literal path prefix of a glob pattern (everything before the first
/// wildcard), trimmed of a trailing separator.
fn literal_prefix(pattern: &str) -> &str {
    let end = pattern
        .find(['*', '?', '['])
        .unwrap_or(pattern.len());
    pattern[..end].trim_end_matches('/')
}

/// Whether two glob patterns can address the same files.
fn patterns_overlap(a: &str, b: &str) -> bool {
    let pa = literal_prefix(a);
    let pb = literal_prefix(b);
    prefixes_overlap(pa, pb) || glob_matches(a, pb) || glob_matches(b, pa)
}

fn prefixes_overlap(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        // A bare wildcard pattern overlaps everything.
        return true;
    }
    path_starts_with(a, b) || path_starts_with(b, a)
}

/// Component-wise prefix check: `src/api` is a prefix of `src/api/v1` but
/// not of `src/api-client`.
fn path_starts_with(longer: &str, prefix: &str) -> bool {
    match longer.strip_prefix(prefix) {
        None => false,
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
    }
}

/// Whether a glob pattern matches a concrete path.
fn glob_matches(pattern: &str, path: &str) -> bool {
    if path.is_empty() {
        return false;
    }
    match Regex::new(&glob_to_regex(pattern)) {
        Ok(re) => re.is_match(path),
        Err(_) => false,
    }
}

/// Translates a glob pattern into an anchored regex: `**` crosses path
/// separators, `*` and `?` do not.
fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            '.' | '+' | '(' | ')' | '|' | '^' | '$' | '{' | '}' | '[' | ']' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out.push('$');
    out
}

/// Whether a pattern falls under the shared-path allowlist.
fn is_shared(pattern: &str) -> bool {
    let prefix = literal_prefix(pattern);
    SHARED_PATHS.iter().any(|shared| {
        let shared_prefix = literal_prefix(shared);
        path_starts_with(prefix, shared_prefix) || glob_matches(shared, prefix)
    })
}
