//! Applicability filtering and rule execution.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, warn};

use super::{Category, Rule, RuleRegistry, Verdict};
use crate::context::ServiceContext;
use crate::report::{ConformanceReport, NotRun, Outcome, RuleVerdict};

/// Cooperative cancellation shared between a run and its caller.
///
/// Checked before each rule starts; a rule already running finishes.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    /// A token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once [`Cancellation::cancel`] has been called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Lifecycle of one rule invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleState {
    /// Not yet started.
    NotStarted,
    /// `verify` is executing.
    Running,
    /// Finished: conforms.
    Pass,
    /// Finished: violation found.
    Fail,
    /// Finished: precondition absent.
    NotApplicable,
    /// Finished: the rule faulted.
    Error,
}

/// A transition the lifecycle does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal rule state transition {from:?} -> {to:?}")]
pub struct IllegalTransition {
    /// State before.
    pub from: RuleState,
    /// Requested state.
    pub to: RuleState,
}

impl RuleState {
    /// True for the four final states.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::NotStarted | Self::Running)
    }

    /// Moves to `to`: `NotStarted → Running → terminal`.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalTransition`] for any other move.
    pub fn transition(self, to: RuleState) -> Result<RuleState, IllegalTransition> {
        match (self, to) {
            (Self::NotStarted, Self::Running) => Ok(to),
            (Self::Running, to) if to.is_terminal() => Ok(to),
            (from, to) => Err(IllegalTransition { from, to }),
        }
    }
}

/// Selects and runs the rules of a registry against contexts.
#[derive(Debug, Clone)]
pub struct Dispatcher<'r> {
    registry: &'r RuleRegistry,
    categories: Vec<Category>,
    parallel: bool,
}

impl<'r> Dispatcher<'r> {
    /// A dispatcher over every rule of `registry`, running in parallel.
    #[must_use]
    pub fn new(registry: &'r RuleRegistry) -> Self {
        Self {
            registry,
            categories: Vec::new(),
            parallel: true,
        }
    }

    /// Restricts to `categories`; empty means all.
    #[must_use]
    pub fn categories(mut self, categories: impl IntoIterator<Item = Category>) -> Self {
        self.categories = categories.into_iter().collect();
        self
    }

    /// Enables or disables parallel execution.
    #[must_use]
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Rules whose category and applicability match `ctx`.
    #[must_use]
    pub fn applicable(&self, ctx: &ServiceContext) -> Vec<&'r dyn Rule> {
        self.registry
            .rules()
            .filter(|rule| {
                let descriptor = rule.descriptor();
                if !self.categories.is_empty() && !self.categories.contains(&descriptor.category) {
                    return false;
                }
                match descriptor.applicability.check(ctx) {
                    Ok(()) => true,
                    Err(reason) => {
                        debug!(rule = descriptor.id, uri = %ctx.uri, %reason, "rule skipped");
                        false
                    }
                }
            })
            .collect()
    }

    /// Runs every applicable rule against `ctx` once.
    ///
    /// Rules not yet started when `cancel` fires are listed in
    /// [`ConformanceReport::not_run`].
    #[must_use]
    pub fn run(&self, ctx: &ServiceContext, cancel: &Cancellation) -> ConformanceReport {
        let rules = self.applicable(ctx);
        let step = |rule: &&'r dyn Rule| {
            if cancel.is_cancelled() {
                Err(NotRun {
                    rule_id: rule.descriptor().id,
                    uri: ctx.uri.clone(),
                })
            } else {
                Ok(execute(*rule, ctx))
            }
        };
        let outcomes: Vec<Result<RuleVerdict, NotRun>> = if self.parallel {
            rules.par_iter().map(step).collect()
        } else {
            rules.iter().map(step).collect()
        };

        let mut report = ConformanceReport::new();
        for outcome in outcomes {
            match outcome {
                Ok(verdict) => report.push(verdict),
                Err(not_run) => report.not_run.push(not_run),
            }
        }
        report
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Runs one rule, containing panics and mapping the result to a verdict.
fn execute(rule: &dyn Rule, ctx: &ServiceContext) -> RuleVerdict {
    let descriptor = rule.descriptor();
    let advance = |state: RuleState, to: RuleState| {
        state.transition(to).map_err(|e| e.to_string())
    };

    let run = || -> Result<RuleVerdict, String> {
        let state = advance(RuleState::NotStarted, RuleState::Running)?;
        debug!(rule = descriptor.id, uri = %ctx.uri, "rule running");
        let result = catch_unwind(AssertUnwindSafe(|| rule.verify(ctx)));

        Ok(match result {
            Ok(Ok(Verdict::Pass)) => {
                advance(state, RuleState::Pass)?;
                RuleVerdict::new(descriptor, &ctx.uri, Outcome::Pass)
            }
            Ok(Ok(Verdict::Fail(mut violation))) => {
                advance(state, RuleState::Fail)?;
                if violation.destination.is_none() {
                    violation.destination = Some(ctx.uri.clone());
                }
                RuleVerdict::fail(descriptor, &ctx.uri, violation)
            }
            Ok(Ok(Verdict::NotApplicable(reason))) => {
                advance(state, RuleState::NotApplicable)?;
                RuleVerdict::new(descriptor, &ctx.uri, Outcome::Skipped).with_message(reason)
            }
            Ok(Err(error)) => {
                advance(state, RuleState::Error)?;
                warn!(rule = descriptor.id, uri = %ctx.uri, %error, "rule faulted");
                RuleVerdict::new(descriptor, &ctx.uri, Outcome::Error)
                    .with_message(error.to_string())
            }
            Err(payload) => {
                advance(state, RuleState::Error)?;
                let message = panic_message(payload.as_ref());
                warn!(rule = descriptor.id, uri = %ctx.uri, %message, "rule panicked");
                RuleVerdict::new(descriptor, &ctx.uri, Outcome::Error)
                    .with_message(format!("rule panicked: {message}"))
            }
        })
    };

    run().unwrap_or_else(|message| {
        RuleVerdict::new(descriptor, &ctx.uri, Outcome::Error).with_message(message)
    })
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::context::{ContextBuilder, PayloadFormat};
    use crate::fetch::{HeaderList, HttpResponse};
    use crate::rules::{
        Applicability, RequirementLevel, RuleDescriptor, RuleError, Violation,
    };
    use crate::tests::fixtures;

    struct Scripted {
        descriptor: RuleDescriptor,
        verdict: fn() -> Result<Verdict, RuleError>,
    }

    impl Scripted {
        fn new(id: &'static str, verdict: fn() -> Result<Verdict, RuleError>) -> Self {
            Self {
                descriptor: RuleDescriptor {
                    id,
                    category: Category::Core,
                    description: "scripted",
                    citations: &[],
                    level: RequirementLevel::Must,
                    applicability: Applicability::ANY,
                },
                verdict,
            }
        }

        fn only(mut self, applicability: Applicability) -> Self {
            self.descriptor.applicability = applicability;
            self
        }
    }

    impl Rule for Scripted {
        fn descriptor(&self) -> &RuleDescriptor {
            &self.descriptor
        }

        fn verify(&self, _ctx: &ServiceContext) -> Result<Verdict, RuleError> {
            (self.verdict)()
        }
    }

    fn context() -> ServiceContext {
        let root = Url::parse(fixtures::SERVICE_ROOT).expect("root");
        let headers: HeaderList = [("Content-Type", "application/atom+xml")].into_iter().collect();
        ContextBuilder::new(root).build(
            "http://host/svc.svc/People",
            HttpResponse::new(200, headers, fixtures::ATOM_FEED_PEOPLE),
        )
    }

    fn registry() -> RuleRegistry {
        RuleRegistry::new(vec![
            Box::new(Scripted::new("t/pass", || Ok(Verdict::Pass))),
            Box::new(Scripted::new("t/fail", || Ok(Verdict::Fail(Violation::new("bad"))))),
            Box::new(Scripted::new("t/na", || Ok(Verdict::not_applicable("no etag")))),
            Box::new(Scripted::new("t/error", || Err(RuleError::Fault("broken".into())))),
            Box::new(Scripted::new("t/panic", || panic!("exploded"))),
            Box::new(
                Scripted::new("t/json", || Ok(Verdict::Pass)).only(Applicability {
                    formats: &[PayloadFormat::JsonLight],
                    ..Applicability::ANY
                }),
            ),
        ])
    }

    fn outcome_of(report: &ConformanceReport, id: &str) -> Option<Outcome> {
        report
            .results
            .iter()
            .find(|v| v.rule_id == id)
            .map(|v| v.outcome)
    }

    #[test]
    fn state_machine() {
        let running = RuleState::NotStarted.transition(RuleState::Running);
        assert_eq!(running, Ok(RuleState::Running));
        assert_eq!(RuleState::Running.transition(RuleState::Fail), Ok(RuleState::Fail));
        assert!(RuleState::NotStarted.transition(RuleState::Pass).is_err());
        assert!(RuleState::Pass.transition(RuleState::Fail).is_err());
        assert!(RuleState::Running.transition(RuleState::NotStarted).is_err());
    }

    #[test]
    fn every_outcome_is_recorded() {
        let registry = registry();
        for parallel in [false, true] {
            let report = Dispatcher::new(&registry)
                .parallel(parallel)
                .run(&context(), &Cancellation::new());
            assert_eq!(report.results.len(), 5);
            assert_eq!(outcome_of(&report, "t/pass"), Some(Outcome::Pass));
            assert_eq!(outcome_of(&report, "t/fail"), Some(Outcome::Fail));
            assert_eq!(outcome_of(&report, "t/na"), Some(Outcome::Skipped));
            assert_eq!(outcome_of(&report, "t/error"), Some(Outcome::Error));
            assert_eq!(outcome_of(&report, "t/panic"), Some(Outcome::Error));
            assert_eq!(outcome_of(&report, "t/json"), None);

            let fail = report.with_outcome(Outcome::Fail).next().expect("fail");
            let violation = fail.violation.as_ref().expect("violation");
            assert_eq!(violation.destination.as_deref(), Some("http://host/svc.svc/People"));
            let panicked = report.results.iter().find(|v| v.rule_id == "t/panic").expect("panic");
            assert!(panicked.message.as_deref().is_some_and(|m| m.contains("exploded")));
        }
    }

    #[test]
    fn category_filter() {
        let registry = registry();
        let report = Dispatcher::new(&registry)
            .categories([Category::Entry])
            .run(&context(), &Cancellation::new());
        assert!(report.results.is_empty());
    }

    #[test]
    fn cancelled_runs_start_nothing() {
        let registry = registry();
        let cancel = Cancellation::new();
        cancel.cancel();
        let report = Dispatcher::new(&registry).run(&context(), &cancel);
        assert!(report.results.is_empty());
        assert_eq!(report.not_run.len(), 5);
    }

    #[test]
    fn inapplicable_rules_are_never_invoked() {
        let json_only = Scripted::new("t/json", || panic!("invoked")).only(Applicability {
            formats: &[PayloadFormat::JsonLight],
            ..Applicability::ANY
        });
        let registry = RuleRegistry::new(vec![Box::new(json_only)]);
        let report = Dispatcher::new(&registry).run(&context(), &Cancellation::new());
        assert!(report.results.is_empty());
        let rule = registry.get("t/json").expect("rule");
        assert_eq!(rule.descriptor().id, "t/json");
    }
}
