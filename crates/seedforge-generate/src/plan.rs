use std::collections::BTreeMap;
use std::time::Instant;

use seedforge_core::DataModel;
use tracing::{info, warn};

use crate::engine::{Call, Engine};
use crate::errors::GenerationError;
use crate::hints::Fingerprint;
use crate::inputs::{ConnectMode, RowInputs, UserModel, UserModels};
use crate::model::{GenerateOptions, GenerationReport};
use crate::statements::{ExecutionSink, to_statements};
use crate::store::Store;

/// State owned by one client and threaded through every plan it runs.
#[derive(Debug, Clone, Default)]
pub struct ClientState {
    /// Rows of every successful run, visible to later runs.
    pub store: Store,
    seeds: BTreeMap<String, u64>,
}

impl ClientState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the run counter of `model` and return it as a seed.
    pub fn next_seed(&mut self, model: &str) -> String {
        let counter = self.seeds.entry(model.to_string()).or_insert(0);
        let seed = counter.to_string();
        *counter += 1;
        seed
    }
}

/// Output of [`Plan::generate`].
#[derive(Debug, Clone)]
pub struct Generated {
    /// Rows produced by this run, in registration order.
    pub store: Store,
    pub report: GenerationReport,
}

/// A request to synthesize rows for one model.
#[derive(Debug, Clone)]
pub struct Plan<'a> {
    data_model: &'a DataModel,
    model: String,
    inputs: RowInputs,
    user_models: UserModels,
    fingerprint: Fingerprint,
    options: GenerateOptions,
    connect: Option<ConnectMode>,
}

impl<'a> Plan<'a> {
    pub fn new(data_model: &'a DataModel, model: &str, inputs: impl Into<RowInputs>) -> Self {
        Self {
            data_model,
            model: model.to_string(),
            inputs: inputs.into(),
            user_models: UserModels::new(),
            fingerprint: Fingerprint::new(),
            options: GenerateOptions::default(),
            connect: None,
        }
    }

    pub fn user_models(mut self, user_models: UserModels) -> Self {
        self.user_models = user_models;
        self
    }

    /// Override a single model, replacing any earlier override for it.
    pub fn user_model(mut self, model: &str, user_model: UserModel) -> Self {
        self.user_models.insert(model.to_string(), user_model);
        self
    }

    pub fn fingerprint(mut self, fingerprint: Fingerprint) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    pub fn options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn connect(mut self, mode: ConnectMode) -> Self {
        self.connect = Some(mode);
        self
    }

    /// Synthesize rows without executing anything.
    ///
    /// On success the generated rows are also appended to `state.store`. On
    /// failure the client state keeps only the advanced seed counter.
    pub fn generate(&self, state: &mut ClientState) -> Result<Generated, GenerationError> {
        let start = Instant::now();
        let counter_seed = state.next_seed(&self.model);
        let run_seed = self.options.seed.clone().unwrap_or(counter_seed);

        info!(model = %self.model, seed = %run_seed, "generation started");

        let mut shared = state.store.clone();
        let mut engine = Engine::new(
            self.data_model,
            &self.user_models,
            &self.fingerprint,
            self.connect.as_ref(),
            run_seed.clone(),
            &mut shared,
            self.options.max_constraint_attempts,
        );
        let outcome = engine.generate_model(&self.model, &self.inputs, Call::root(&self.model));
        let (store, mut report) = engine.finish();

        match outcome {
            Ok(rows) => {
                state.store = shared;
                report.duration_ms =
                    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
                info!(
                    model = %self.model,
                    seed = %run_seed,
                    rows = rows.len(),
                    rows_total = report.rows_total,
                    retries = report.retries_total,
                    duration_ms = report.duration_ms,
                    "generation completed"
                );
                Ok(Generated { store, report })
            }
            Err(err) => {
                warn!(model = %self.model, seed = %run_seed, error = %err, "generation failed");
                Err(err)
            }
        }
    }

    /// Generate, then hand the emitted statements to `sink` once.
    pub async fn run(
        &self,
        state: &mut ClientState,
        sink: &dyn ExecutionSink,
    ) -> Result<Generated, GenerationError> {
        let generated = self.generate(state)?;
        let statements = to_statements(self.data_model, &generated.store)?;
        let count = statements.len();

        if let Err(err) = sink.run(statements).await {
            warn!(model = %self.model, error = %err, "execution failed");
            return Err(GenerationError::Execution(err.to_string()));
        }

        info!(model = %self.model, statements = count, "statements executed");
        Ok(generated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_count_per_model() {
        let mut state = ClientState::new();
        assert_eq!(state.next_seed("User"), "0");
        assert_eq!(state.next_seed("User"), "1");
        assert_eq!(state.next_seed("Post"), "0");
    }
}
