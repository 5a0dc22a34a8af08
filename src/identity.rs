//! Proxy and user-agent rotation.
//!
//! Every render session is launched with one [`Identity`]: an optional proxy
//! and an optional user agent, picked fresh from the [`IdentityPool`] at the
//! start of each pagination cycle. The pick is delegated to a [`Rotation`]
//! strategy so uniform-random (the default) and round-robin are
//! interchangeable; the only contract is that the identity can vary per
//! session.
//!
//! Both lists come from optional line-delimited files. A missing proxy list
//! means "no proxy"; a missing or empty user-agent list falls back to the
//! configured default user agent. Both cases emit a warning, never an error.

use crate::config::{IdentityConfig, RotationStrategy};
use rand::Rng;
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// The (proxy, user agent) pair bound to one render session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub proxy: Option<String>,
    pub user_agent: Option<String>,
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "proxy {}, user agent {}",
            self.proxy.as_deref().unwrap_or("none"),
            self.user_agent.as_deref().unwrap_or("default")
        )
    }
}

/// Strategy for picking one entry out of a list.
pub trait Rotation: Send + Sync {
    /// Pick an index into a list of `len` entries. `len` is never zero.
    fn pick(&self, len: usize) -> usize;
}

/// Uniform random selection. Repeats are possible.
#[derive(Debug, Default)]
pub struct UniformRandom;

impl Rotation for UniformRandom {
    fn pick(&self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }
}

/// Cycles through the list in order, wrapping around.
#[derive(Debug, Default)]
pub struct RoundRobin {
    next: AtomicUsize,
}

impl Rotation for RoundRobin {
    fn pick(&self, len: usize) -> usize {
        self.next.fetch_add(1, Ordering::Relaxed) % len
    }
}

fn rotation_for(strategy: RotationStrategy) -> Box<dyn Rotation> {
    match strategy {
        RotationStrategy::Random => Box::new(UniformRandom),
        RotationStrategy::RoundRobin => Box::new(RoundRobin::default()),
    }
}

/// Read-only pool of proxies and user agents shared by every session.
pub struct IdentityPool {
    proxies: Vec<String>,
    user_agents: Vec<String>,
    proxy_rotation: Box<dyn Rotation>,
    agent_rotation: Box<dyn Rotation>,
}

impl fmt::Debug for IdentityPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityPool")
            .field("proxies", &self.proxies)
            .field("user_agents", &self.user_agents)
            .finish_non_exhaustive()
    }
}

impl IdentityPool {
    /// Build a pool from in-memory lists. Either list may be empty.
    pub fn new(
        proxies: Vec<String>,
        user_agents: Vec<String>,
        strategy: RotationStrategy,
    ) -> Self {
        Self {
            proxies,
            user_agents,
            proxy_rotation: rotation_for(strategy),
            agent_rotation: rotation_for(strategy),
        }
    }

    /// Load the pool from the files named in `config`, resolved against `root`.
    ///
    /// Missing files are not errors: they produce a warning and fall back to
    /// no proxy / the default user agent. Any other read failure is returned.
    pub fn load(root: &Path, config: &IdentityConfig) -> io::Result<Self> {
        let proxy_path = root.join(&config.proxy_file);
        let proxies = match read_lines(&proxy_path)? {
            Some(lines) => lines,
            None => {
                tracing::warn!(
                    path = %proxy_path.display(),
                    "proxy list not found; sessions will connect directly"
                );
                Vec::new()
            }
        };

        let agent_path = root.join(&config.user_agent_file);
        let user_agents = match read_lines(&agent_path)? {
            Some(lines) if !lines.is_empty() => lines,
            Some(_) => {
                tracing::warn!(
                    path = %agent_path.display(),
                    user_agent = %config.default_user_agent,
                    "user-agent list is empty; using the default user agent"
                );
                vec![config.default_user_agent.clone()]
            }
            None => {
                tracing::warn!(
                    path = %agent_path.display(),
                    user_agent = %config.default_user_agent,
                    "user-agent list not found; using the default user agent"
                );
                vec![config.default_user_agent.clone()]
            }
        };

        Ok(Self::new(proxies, user_agents, config.strategy))
    }

    pub fn proxies(&self) -> &[String] {
        &self.proxies
    }

    pub fn user_agents(&self) -> &[String] {
        &self.user_agents
    }

    /// Pick the identity for the next session.
    pub fn next_identity(&self) -> Identity {
        Identity {
            proxy: pick(&self.proxies, self.proxy_rotation.as_ref()),
            user_agent: pick(&self.user_agents, self.agent_rotation.as_ref()),
        }
    }
}

fn pick(options: &[String], rotation: &dyn Rotation) -> Option<String> {
    if options.is_empty() {
        return None;
    }
    options.get(rotation.pick(options.len())).cloned()
}

/// Read a line-delimited list, skipping blank lines and surrounding whitespace.
///
/// Returns `Ok(None)` when the file does not exist.
fn read_lines(path: &Path) -> io::Result<Option<Vec<String>>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::TempDir;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn missing_proxy_file_single_agent_always_same_identity() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("user_agent.txt"), "Agent/1.0\n").unwrap();

        let pool = IdentityPool::load(tmp.path(), &IdentityConfig::default()).unwrap();
        for _ in 0..20 {
            let identity = pool.next_identity();
            assert_eq!(identity.proxy, None);
            assert_eq!(identity.user_agent.as_deref(), Some("Agent/1.0"));
        }
    }

    #[test]
    fn missing_both_files_falls_back_to_defaults() {
        let tmp = TempDir::new().unwrap();
        let pool = IdentityPool::load(tmp.path(), &IdentityConfig::default()).unwrap();
        assert!(pool.proxies().is_empty());
        assert_eq!(pool.user_agents(), ["Mozilla/5.0"]);
        assert_eq!(
            pool.next_identity(),
            Identity {
                proxy: None,
                user_agent: Some("Mozilla/5.0".to_string()),
            }
        );
    }

    #[test]
    fn empty_agent_file_falls_back_to_default() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("user_agent.txt"), "\n  \n").unwrap();
        let config = IdentityConfig {
            default_user_agent: "Fallback/2".to_string(),
            ..Default::default()
        };
        let pool = IdentityPool::load(tmp.path(), &config).unwrap();
        assert_eq!(pool.user_agents(), ["Fallback/2"]);
    }

    #[test]
    fn blank_lines_and_whitespace_ignored() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("proxy_list.txt"),
            "10.0.0.1:8080\n\n  10.0.0.2:8080  \r\n",
        )
        .unwrap();
        let pool = IdentityPool::load(tmp.path(), &IdentityConfig::default()).unwrap();
        assert_eq!(pool.proxies(), ["10.0.0.1:8080", "10.0.0.2:8080"]);
    }

    #[test]
    fn random_rotation_stays_in_pool() {
        let proxies = strings(&["a:1", "b:2", "c:3"]);
        let pool = IdentityPool::new(proxies.clone(), strings(&["ua"]), RotationStrategy::Random);
        let seen: HashSet<String> = (0..200)
            .filter_map(|_| pool.next_identity().proxy)
            .collect();
        assert!(seen.iter().all(|p| proxies.contains(p)));
        // 200 uniform draws over 3 entries hitting only one is vanishingly unlikely
        assert!(seen.len() > 1);
    }

    #[test]
    fn round_robin_cycles_in_order() {
        let pool = IdentityPool::new(
            strings(&["a:1", "b:2"]),
            strings(&["ua-1", "ua-2", "ua-3"]),
            RotationStrategy::RoundRobin,
        );
        let proxies: Vec<_> = (0..4).map(|_| pool.next_identity().proxy.unwrap()).collect();
        assert_eq!(proxies, ["a:1", "b:2", "a:1", "b:2"]);
    }

    #[test]
    fn round_robin_lists_rotate_independently() {
        let pool = IdentityPool::new(
            strings(&["a:1", "b:2"]),
            strings(&["ua-1", "ua-2", "ua-3"]),
            RotationStrategy::RoundRobin,
        );
        let agents: Vec<_> = (0..4)
            .map(|_| pool.next_identity().user_agent.unwrap())
            .collect();
        assert_eq!(agents, ["ua-1", "ua-2", "ua-3", "ua-1"]);
    }

    #[test]
    fn identity_display() {
        let identity = Identity {
            proxy: Some("10.0.0.1:8080".to_string()),
            user_agent: None,
        };
        assert_eq!(identity.to_string(), "proxy 10.0.0.1:8080, user agent default");
    }
}
