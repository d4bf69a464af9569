//! Clans: a manager and its team working toward one goal.
//!
//! `unleash` makes a single planning call, hands the same plan to every
//! member, and runs the manager's loop with the goal. From there the work
//! is a tree of synchronous `send_message` calls rooted at the manager:
//!
//! ```text
//! Clan::unleash
//!   └─ manager.run(goal)
//!        ├─ send_message → researcher.run("Message from manager: ...")
//!        │                    └─ send_message → manager   (busy: a reply)
//!        └─ send_message → writer.run(...)
//! ```
//!
//! Every member sits behind its own `Mutex`. A target that cannot be locked
//! is already running further up the call chain, so a message to it is
//! treated as the answer to whatever it asked.

use regex_lite::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError, TryLockError, Weak};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use unison_core::{ModelRequest, ProviderError, TaskResult};

use crate::loop_runner::Agent;
use crate::prompts::{self, ClanContext, NO_PLAN};

static THINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("think pattern is valid"));

const FAILED_RESULT: &str = "Clan mission failed due to error";

#[derive(Debug, Error, PartialEq)]
pub enum ClanError {
    #[error("clan {0} must not be empty")]
    EmptyField(&'static str),

    #[error("clan has no members")]
    NoMembers,

    #[error("agent identity must not be empty")]
    UnnamedMember,

    #[error("duplicate member identity '{0}'")]
    DuplicateMember(String),

    #[error("manager '{0}' is not a member of the clan")]
    UnknownManager(String),
}

/// Outcome of one `send_message`.
pub(crate) enum Delivery {
    /// The target ran and produced this result
    Response(String),
    /// The target is waiting on the sender; the message answers it
    Reply,
    Skipped,
}

/// What each member knows about its clan.
pub struct ClanMembership {
    pub(crate) clan_name: String,
    pub(crate) goal: String,
    pub(crate) shared_instruction: String,
    pub(crate) roster: String,
    pub(crate) is_manager: bool,
    pub(crate) plan: Option<Arc<str>>,
    members: HashMap<String, Weak<Mutex<Agent>>>,
}

impl ClanMembership {
    pub(crate) fn context(&self) -> ClanContext<'_> {
        ClanContext {
            clan_name: &self.clan_name,
            goal: &self.goal,
            shared_instruction: &self.shared_instruction,
            plan: self.plan.as_deref().unwrap_or(NO_PLAN),
            roster: &self.roster,
        }
    }

    /// Run `target` with a message from `sender` and wait for its result.
    pub(crate) fn deliver(
        &self,
        sender: &str,
        target: &str,
        message: &str,
        resource: Option<&str>,
    ) -> Delivery {
        if target == sender {
            warn!(agent = %sender, "Agent cannot send a message to itself, skipping");
            return Delivery::Skipped;
        }

        let Some(handle) = self.members.get(target).and_then(Weak::upgrade) else {
            warn!(agent = %sender, target, "Unknown clan member, skipping");
            return Delivery::Skipped;
        };

        let mut agent = match handle.try_lock() {
            Ok(agent) => agent,
            Err(TryLockError::WouldBlock) => {
                info!(agent = %sender, target, "Replying to waiting agent");
                return Delivery::Reply;
            }
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        let mut task = format!("Message from {sender}: {message}");
        if let Some(resource) = resource {
            task.push_str(&format!("\nAdditional resource: {resource}"));
        }

        info!(from = %sender, to = %target, "Delivering message");
        let result = agent.run(&task);
        if result.success {
            Delivery::Response(result.result)
        } else {
            warn!(
                from = %sender,
                to = %target,
                error = result.error.as_deref().unwrap_or("unknown error"),
                "Delegated task failed"
            );
            Delivery::Skipped
        }
    }
}

fn lock(agent: &Mutex<Agent>) -> MutexGuard<'_, Agent> {
    agent.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Remove `<think>...</think>` spans and surrounding whitespace.
pub fn strip_think(text: &str) -> String {
    THINK.replace_all(text, "").trim().to_string()
}

pub struct Clan {
    name: String,
    manager: String,
    identities: Vec<String>,
    members: Vec<Arc<Mutex<Agent>>>,
    shared_instruction: String,
    goal: String,
    roster: String,
    plan: Option<Arc<str>>,
    round: u32,
}

impl Clan {
    /// Form a clan. `manager` is the identity of one of `members`.
    ///
    /// Every member learns the roster and the shared instruction. Only the
    /// manager keeps its user input.
    pub fn new(
        name: impl Into<String>,
        manager: impl Into<String>,
        members: Vec<Agent>,
        shared_instruction: impl Into<String>,
        goal: impl Into<String>,
    ) -> Result<Self, ClanError> {
        let name = name.into();
        let manager = manager.into();
        let shared_instruction = shared_instruction.into();
        let goal = goal.into();

        for (field, value) in [
            ("name", &name),
            ("shared instruction", &shared_instruction),
            ("goal", &goal),
        ] {
            if value.trim().is_empty() {
                return Err(ClanError::EmptyField(field));
            }
        }
        if members.is_empty() {
            return Err(ClanError::NoMembers);
        }

        let mut seen = HashSet::new();
        for agent in &members {
            if agent.identity().trim().is_empty() {
                return Err(ClanError::UnnamedMember);
            }
            if !seen.insert(agent.identity()) {
                return Err(ClanError::DuplicateMember(agent.identity().to_string()));
            }
        }
        if !seen.contains(manager.as_str()) {
            return Err(ClanError::UnknownManager(manager));
        }

        let roster = prompts::roster(
            members.iter().map(|a| (a.identity(), a.description(), a.task())),
            &manager,
        );
        let identities: Vec<String> = members.iter().map(|a| a.identity().to_string()).collect();
        let handles: Vec<Arc<Mutex<Agent>>> = members
            .into_iter()
            .map(|agent| Arc::new(Mutex::new(agent)))
            .collect();
        let directory: HashMap<String, Weak<Mutex<Agent>>> = identities
            .iter()
            .cloned()
            .zip(handles.iter().map(Arc::downgrade))
            .collect();

        for handle in &handles {
            let mut agent = lock(handle);
            let is_manager = agent.identity == manager;
            if !is_manager {
                agent.input = None;
            }
            agent.clan = Some(ClanMembership {
                clan_name: name.clone(),
                goal: goal.clone(),
                shared_instruction: shared_instruction.clone(),
                roster: roster.clone(),
                is_manager,
                plan: None,
                members: directory.clone(),
            });
        }

        info!(clan = %name, manager = %manager, members = handles.len(), "Clan formed");
        Ok(Self {
            name,
            manager,
            identities,
            members: handles,
            shared_instruction,
            goal,
            roster,
            plan: None,
            round: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn manager(&self) -> &str {
        &self.manager
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn shared_instruction(&self) -> &str {
        &self.shared_instruction
    }

    pub fn roster(&self) -> &str {
        &self.roster
    }

    pub fn plan(&self) -> Option<&str> {
        self.plan.as_deref()
    }

    /// Planning rounds completed by the latest `unleash`.
    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn members(&self) -> &[Arc<Mutex<Agent>>] {
        &self.members
    }

    /// Member identities in roster order.
    pub fn identities(&self) -> &[String] {
        &self.identities
    }

    pub fn member(&self, identity: &str) -> Option<Arc<Mutex<Agent>>> {
        self.identities
            .iter()
            .position(|id| id == identity)
            .map(|index| Arc::clone(&self.members[index]))
    }

    /// Plan once, share the plan, then let the manager drive.
    pub fn unleash(&mut self) -> TaskResult {
        let start = Instant::now();
        let identity = format!("Clan-{}", self.name);
        self.round = 0;

        let Some(manager) = self.member(&self.manager) else {
            return TaskResult::failed(
                identity,
                FAILED_RESULT,
                format!("Clan execution failed: manager '{}' is missing", self.manager),
                start.elapsed(),
                self.round,
            );
        };

        info!(clan = %self.name, "Generating plan");
        let plan = match self.generate_plan(&manager) {
            Ok(plan) => plan,
            Err(e) => {
                error!(clan = %self.name, error = %e, "Planning failed");
                return TaskResult::failed(
                    identity,
                    FAILED_RESULT,
                    format!("Clan execution failed: {e}"),
                    start.elapsed(),
                    self.round,
                );
            }
        };
        debug!(clan = %self.name, plan = %plan, "Plan ready");

        for handle in &self.members {
            if let Some(membership) = lock(handle).clan.as_mut() {
                membership.plan = Some(Arc::clone(&plan));
            }
        }
        self.plan = Some(plan);
        self.round += 1;

        info!(clan = %self.name, manager = %self.manager, "Executing mission");
        let outcome = lock(&manager).run(&self.goal);
        let elapsed = start.elapsed();

        if outcome.success {
            info!(clan = %self.name, elapsed_ms = elapsed.as_millis() as u64, "Mission complete");
            TaskResult::completed(identity, outcome.result, elapsed, self.round)
        } else {
            TaskResult::failed(
                identity,
                outcome.result,
                outcome.error.unwrap_or_default(),
                elapsed,
                self.round,
            )
        }
    }

    fn generate_plan(&self, manager: &Mutex<Agent>) -> Result<Arc<str>, ProviderError> {
        let model = Arc::clone(&lock(manager).model);
        let request = ModelRequest::single("", prompts::plan(&self.roster, &self.goal));
        let response = model.complete(request)?;
        Ok(Arc::from(strip_think(&response)))
    }
}

impl std::fmt::Debug for Clan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clan")
            .field("name", &self.name)
            .field("manager", &self.manager)
            .field("members", &self.members.len())
            .field("round", &self.round)
            .finish_non_exhaustive()
    }
}
