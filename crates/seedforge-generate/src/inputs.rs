//! Row input specifications and per-model user overrides.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use seedforge_core::{Row, Value};

use crate::errors::BoxError;
use crate::hints::GenerateFieldOptions;
use crate::pick;
use crate::store::Store;

/// Produces a scalar value for one field of one row.
pub type FieldGenerator =
    Arc<dyn Fn(&FieldContext<'_>) -> Result<Value, BoxError> + Send + Sync>;
/// Produces the input record for one row.
pub type RecordBuilder =
    Arc<dyn Fn(&InputContext<'_>) -> Result<ModelRecord, BoxError> + Send + Sync>;
/// Samples an existing row instead of generating a new one.
pub type ConnectCallback =
    Arc<dyn Fn(&InputContext<'_>) -> Result<Row, BoxError> + Send + Sync>;
/// Decides how a parent relation of one row is satisfied.
pub type ParentBuilder =
    Arc<dyn Fn(&InputContext<'_>) -> Result<ParentChoice, BoxError> + Send + Sync>;
/// Expands into one input per requested row.
pub type CountCallback =
    Arc<dyn Fn(&CountHelper<'_>) -> Result<Vec<RowInput>, BoxError> + Send + Sync>;

/// Context handed to record builders, parent builders and connect callbacks.
pub struct InputContext<'a> {
    /// Cross-run store shared by every plan of a client.
    pub shared: &'a Store,
    /// Rows generated by the current run.
    pub local: &'a Store,
    pub index: usize,
    pub seed: &'a str,
}

/// Context handed to field generators.
pub struct FieldContext<'a> {
    pub index: usize,
    pub seed: &'a str,
    /// The row being generated, as filled so far.
    pub data: &'a Row,
    pub shared: &'a Store,
    pub local: &'a Store,
    pub options: &'a GenerateFieldOptions,
}

/// Insertion-ordered map of field name to input.
#[derive(Clone, Default)]
pub struct ModelRecord {
    entries: Vec<(String, FieldInput)>,
}

impl ModelRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `field`, keeping the position of an earlier entry for the same field.
    pub fn set(mut self, field: &str, input: impl Into<FieldInput>) -> Self {
        self.insert(field, input.into());
        self
    }

    pub fn value(self, field: &str, value: impl Into<Value>) -> Self {
        self.set(field, FieldInput::Value(value.into()))
    }

    pub fn generate<F>(self, field: &str, generator: F) -> Self
    where
        F: Fn(&FieldContext<'_>) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.set(field, FieldInput::Generate(Arc::new(generator)))
    }

    pub fn parent(self, field: &str, parent: ParentInput) -> Self {
        self.set(field, FieldInput::Parent(parent))
    }

    pub fn children(self, field: &str, children: impl Into<RowInputs>) -> Self {
        self.set(field, FieldInput::Children(children.into()))
    }

    pub fn insert(&mut self, field: &str, input: FieldInput) {
        match self.entries.iter_mut().find(|(name, _)| name == field) {
            Some(entry) => entry.1 = input,
            None => self.entries.push((field.to_string(), input)),
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldInput> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, input)| input)
    }

    /// Literal value supplied for `field`, if any.
    pub fn literal(&self, field: &str) -> Option<&Value> {
        match self.get(field) {
            Some(FieldInput::Value(value)) => Some(value),
            _ => None,
        }
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ModelRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(name, input)| (name, input)))
            .finish()
    }
}

impl From<Row> for ModelRecord {
    fn from(row: Row) -> Self {
        let mut record = ModelRecord::new();
        for (field, value) in row {
            record.insert(&field, FieldInput::Value(value));
        }
        record
    }
}

/// Input supplied for one field of a row.
#[derive(Clone)]
pub enum FieldInput {
    Value(Value),
    Generate(FieldGenerator),
    Parent(ParentInput),
    Children(RowInputs),
}

impl fmt::Debug for FieldInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldInput::Value(value) => f.debug_tuple("Value").field(value).finish(),
            FieldInput::Generate(_) => f.write_str("Generate(..)"),
            FieldInput::Parent(parent) => f.debug_tuple("Parent").field(parent).finish(),
            FieldInput::Children(children) => {
                f.debug_tuple("Children").field(children).finish()
            }
        }
    }
}

impl From<Value> for FieldInput {
    fn from(value: Value) -> Self {
        FieldInput::Value(value)
    }
}

impl From<ParentInput> for FieldInput {
    fn from(value: ParentInput) -> Self {
        FieldInput::Parent(value)
    }
}

impl From<RowInputs> for FieldInput {
    fn from(value: RowInputs) -> Self {
        FieldInput::Children(value)
    }
}

/// Override for a parent relation.
#[derive(Clone)]
pub enum ParentInput {
    /// Generate a new parent from this input record.
    Record(ModelRecord),
    /// Decide at generation time whether to create or connect.
    Build(ParentBuilder),
    /// Connect to an existing row.
    Connect(ConnectCallback),
}

impl ParentInput {
    pub fn build<F>(builder: F) -> Self
    where
        F: Fn(&InputContext<'_>) -> Result<ParentChoice, BoxError> + Send + Sync + 'static,
    {
        ParentInput::Build(Arc::new(builder))
    }

    pub fn connect<F>(callback: F) -> Self
    where
        F: Fn(&InputContext<'_>) -> Result<Row, BoxError> + Send + Sync + 'static,
    {
        ParentInput::Connect(Arc::new(callback))
    }
}

impl fmt::Debug for ParentInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentInput::Record(record) => f.debug_tuple("Record").field(record).finish(),
            ParentInput::Build(_) => f.write_str("Build(..)"),
            ParentInput::Connect(_) => f.write_str("Connect(..)"),
        }
    }
}

/// Outcome of a parent builder.
#[derive(Clone)]
pub enum ParentChoice {
    Create(ModelRecord),
    Connect(ConnectCallback),
    /// Connect through the target model's configured connect source.
    ConnectFallback,
}

impl ParentChoice {
    pub fn connect<F>(callback: F) -> Self
    where
        F: Fn(&InputContext<'_>) -> Result<Row, BoxError> + Send + Sync + 'static,
    {
        ParentChoice::Connect(Arc::new(callback))
    }
}

/// Input for one requested row.
#[derive(Clone)]
pub enum RowInput {
    Record(ModelRecord),
    Build(RecordBuilder),
}

impl RowInput {
    pub fn build<F>(builder: F) -> Self
    where
        F: Fn(&InputContext<'_>) -> Result<ModelRecord, BoxError> + Send + Sync + 'static,
    {
        RowInput::Build(Arc::new(builder))
    }
}

impl fmt::Debug for RowInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowInput::Record(record) => f.debug_tuple("Record").field(record).finish(),
            RowInput::Build(_) => f.write_str("Build(..)"),
        }
    }
}

impl From<ModelRecord> for RowInput {
    fn from(value: ModelRecord) -> Self {
        RowInput::Record(value)
    }
}

/// Polymorphic input specification for a set of rows.
#[derive(Clone)]
pub enum RowInputs {
    One(RowInput),
    Many(Vec<RowInput>),
    Count(CountCallback),
}

impl RowInputs {
    /// `count` empty rows.
    pub fn count(count: impl Into<Count>) -> Self {
        let count = count.into();
        RowInputs::Count(Arc::new(
            move |helper: &CountHelper<'_>| -> Result<Vec<RowInput>, BoxError> {
                Ok(helper.count(count))
            },
        ))
    }

    /// `count` rows, each built by `builder`.
    pub fn count_with<F>(count: impl Into<Count>, builder: F) -> Self
    where
        F: Fn(&InputContext<'_>) -> Result<ModelRecord, BoxError> + Send + Sync + 'static,
    {
        let count = count.into();
        let builder: RecordBuilder = Arc::new(builder);
        RowInputs::Count(Arc::new(
            move |helper: &CountHelper<'_>| -> Result<Vec<RowInput>, BoxError> {
                helper.count_with(count, &builder)
            },
        ))
    }

    /// Fully custom count callback.
    pub fn with_counter<F>(callback: F) -> Self
    where
        F: Fn(&CountHelper<'_>) -> Result<Vec<RowInput>, BoxError> + Send + Sync + 'static,
    {
        RowInputs::Count(Arc::new(callback))
    }
}

impl fmt::Debug for RowInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowInputs::One(input) => f.debug_tuple("One").field(input).finish(),
            RowInputs::Many(inputs) => f.debug_tuple("Many").field(inputs).finish(),
            RowInputs::Count(_) => f.write_str("Count(..)"),
        }
    }
}

impl From<ModelRecord> for RowInputs {
    fn from(value: ModelRecord) -> Self {
        RowInputs::One(RowInput::Record(value))
    }
}

impl From<RowInput> for RowInputs {
    fn from(value: RowInput) -> Self {
        RowInputs::One(value)
    }
}

impl From<Vec<ModelRecord>> for RowInputs {
    fn from(value: Vec<ModelRecord>) -> Self {
        RowInputs::Many(value.into_iter().map(RowInput::Record).collect())
    }
}

impl From<Vec<RowInput>> for RowInputs {
    fn from(value: Vec<RowInput>) -> Self {
        RowInputs::Many(value)
    }
}

/// Number of rows requested by a count callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Count {
    Exact(usize),
    /// Inclusive range resolved through the deterministic primitive.
    Range { min: usize, max: usize },
}

impl From<usize> for Count {
    fn from(value: usize) -> Self {
        Count::Exact(value)
    }
}

impl From<std::ops::RangeInclusive<usize>> for Count {
    fn from(value: std::ops::RangeInclusive<usize>) -> Self {
        let (min, max) = value.into_inner();
        Count::Range { min, max }
    }
}

/// Helper passed to count callbacks; resolves counts against the site seed.
pub struct CountHelper<'a> {
    pub seed: &'a str,
    pub shared: &'a Store,
    pub local: &'a Store,
}

impl CountHelper<'_> {
    pub fn resolve(&self, count: Count) -> usize {
        match count {
            Count::Exact(count) => count,
            Count::Range { min, max } => {
                let min = i64::try_from(min).unwrap_or(i64::MAX);
                let max = i64::try_from(max).unwrap_or(i64::MAX);
                usize::try_from(pick::int(self.seed, min..=max)).unwrap_or(0)
            }
        }
    }

    pub fn count(&self, count: Count) -> Vec<RowInput> {
        (0..self.resolve(count))
            .map(|_| RowInput::Record(ModelRecord::new()))
            .collect()
    }

    /// One record per requested row, each built eagerly with seed `seed/index`.
    pub fn count_with(
        &self,
        count: Count,
        builder: &RecordBuilder,
    ) -> Result<Vec<RowInput>, BoxError> {
        (0..self.resolve(count))
            .map(|index| {
                let seed = format!("{}/{}", self.seed, index);
                let ctx = InputContext {
                    shared: self.shared,
                    local: self.local,
                    index,
                    seed: &seed,
                };
                builder(&ctx).map(RowInput::Record)
            })
            .collect()
    }
}

/// Per-model user override: field generators plus an optional connect source.
#[derive(Clone, Default)]
pub struct UserModel {
    data: Vec<(String, FieldGenerator)>,
    pub connect: Option<ConnectCallback>,
}

impl UserModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate<F>(mut self, field: &str, generator: F) -> Self
    where
        F: Fn(&FieldContext<'_>) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        let generator: FieldGenerator = Arc::new(generator);
        match self.data.iter_mut().find(|(name, _)| name == field) {
            Some(entry) => entry.1 = generator,
            None => self.data.push((field.to_string(), generator)),
        }
        self
    }

    pub fn connect<F>(mut self, callback: F) -> Self
    where
        F: Fn(&InputContext<'_>) -> Result<Row, BoxError> + Send + Sync + 'static,
    {
        self.connect = Some(Arc::new(callback));
        self
    }

    pub fn generator(&self, field: &str) -> Option<&FieldGenerator> {
        self.data
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, generator)| generator)
    }

    /// Field names with a generator, in the order they were declared.
    pub fn generator_keys(&self) -> impl Iterator<Item = &str> {
        self.data.iter().map(|(name, _)| name.as_str())
    }
}

impl fmt::Debug for UserModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserModel")
            .field("data", &self.generator_keys().collect::<Vec<_>>())
            .field("connect", &self.connect.is_some())
            .finish()
    }
}

/// User overrides for every model of a run.
pub type UserModels = BTreeMap<String, UserModel>;

/// Where a connect lookup for a model comes from.
#[derive(Clone)]
pub enum ConnectSource {
    /// Callback declared on the user model.
    UserProvided(ConnectCallback),
    /// Deterministic sampling of the run's connect pool.
    DefaultFallback,
}

impl fmt::Debug for ConnectSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectSource::UserProvided(_) => f.write_str("UserProvided(..)"),
            ConnectSource::DefaultFallback => f.write_str("DefaultFallback"),
        }
    }
}

/// Rows available for connect sampling during a run.
#[derive(Debug, Clone)]
pub enum ConnectMode {
    /// Every row of the shared store.
    All,
    /// Explicit partial pool; models without an entry get an empty pool.
    Pool(BTreeMap<String, Vec<Row>>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_keeps_first_insertion_position() {
        let record = ModelRecord::new()
            .value("b", 1)
            .value("a", 2)
            .value("b", 3);
        let keys: Vec<_> = record.keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(record.literal("b"), Some(&Value::Int(3)));
    }

    #[test]
    fn count_helper_resolves_ranges_deterministically() {
        let store = Store::new();
        let helper = CountHelper {
            seed: "0/User/0/posts",
            shared: &store,
            local: &store,
        };
        let first = helper.resolve(Count::from(2..=5));
        assert!((2..=5).contains(&first));
        assert_eq!(first, helper.resolve(Count::from(2..=5)));
        assert_eq!(helper.count(Count::Exact(3)).len(), 3);
    }

    #[test]
    fn count_with_builds_each_row_with_indexed_seed() {
        let store = Store::new();
        let helper = CountHelper {
            seed: "s",
            shared: &store,
            local: &store,
        };
        let builder: RecordBuilder =
            Arc::new(|ctx: &InputContext<'_>| -> Result<ModelRecord, BoxError> {
                Ok(ModelRecord::new().value("seed", ctx.seed.to_string()))
            });
        let inputs = helper
            .count_with(Count::Exact(2), &builder)
            .expect("build inputs");
        let seeds: Vec<_> = inputs
            .iter()
            .map(|input| match input {
                RowInput::Record(record) => record.literal("seed").cloned(),
                RowInput::Build(_) => None,
            })
            .collect();
        assert_eq!(
            seeds,
            vec![Some(Value::from("s/0")), Some(Value::from("s/1"))]
        );
    }

    #[test]
    fn user_model_preserves_generator_order() {
        let model = UserModel::new()
            .generate("c", |_| Ok(Value::Null))
            .generate("a", |_| Ok(Value::Null));
        let keys: Vec<_> = model.generator_keys().collect();
        assert_eq!(keys, vec!["c", "a"]);
    }
}
