use crate::cache::{CacheReset, CacheRule};
use crate::filter::{Assignment, Filter, Include, Matcher, OptionPin, Target};
use crate::graph::{OptionId, StepId};
use tokio_util::sync::CancellationToken;

/// Parameters of one execute call.
///
/// The default runs the latest step along every step's latest option,
/// caching the target only and resetting nothing.
///
/// ```
/// use hodos::{CacheReset, ExecuteOptions, Filter};
///
/// let options = ExecuteOptions::new()
///     .all()
///     .exclude(Filter::from_iter([("step1", "option2")]))
///     .cache_reset(CacheReset::LastStep);
/// assert!(options.exclude.is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    pub target: Target,
    pub option: OptionPin,
    pub include: Include,
    pub exclude: Option<Filter>,
    /// Extra cache-eligible steps besides the targets
    pub cache_include: Vec<CacheRule>,
    /// Steps never cached, applied after `cache_include` and the targets
    pub cache_exclude: Vec<CacheRule>,
    /// `None` defers to the session default
    pub cache_reset: Option<CacheReset>,
    pub cancel: Option<CancellationToken>,
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `step` with `option`, every other step unconstrained
    pub fn for_option(step: impl Into<StepId>, option: impl Into<OptionId>) -> Self {
        let (step, option) = (step.into(), option.into());
        Self {
            target: Target::Steps(vec![step.clone()]),
            option: OptionPin::Matching(Matcher::Exact(option.clone())),
            include: Include::Filter(Assignment::new().with(step, option).into()),
            ..Self::default()
        }
    }

    /// Considers every combination of options
    pub fn all(mut self) -> Self {
        self.include = Include::All;
        self
    }

    pub fn target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    pub fn step(self, step: impl Into<StepId>) -> Self {
        self.target(Target::step(step))
    }

    pub fn outputs(self) -> Self {
        self.target(Target::Outputs)
    }

    pub fn option(mut self, pin: impl Into<OptionPin>) -> Self {
        self.option = pin.into();
        self
    }

    /// Removes the pin on the targets' options
    pub fn any_option(mut self) -> Self {
        self.option = OptionPin::Any;
        self
    }

    pub fn include(mut self, include: impl Into<Include>) -> Self {
        self.include = include.into();
        self
    }

    pub fn exclude(mut self, exclude: impl Into<Filter>) -> Self {
        self.exclude = Some(exclude.into());
        self
    }

    pub fn cache_include(mut self, rule: CacheRule) -> Self {
        self.cache_include.push(rule);
        self
    }

    pub fn cache_exclude(mut self, rule: CacheRule) -> Self {
        self.cache_exclude.push(rule);
        self
    }

    pub fn cache_reset(mut self, reset: CacheReset) -> Self {
        self.cache_reset = Some(reset);
        self
    }

    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}
