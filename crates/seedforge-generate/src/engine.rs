use std::collections::BTreeMap;

use seedforge_core::{DataModel, Model, ParentField, Row, ScalarField, UniqueConstraint, Value};
use tracing::debug;

use crate::constraints::ConstraintTracker;
use crate::errors::{BoxError, GenerationError};
use crate::hints::Fingerprint;
use crate::inputs::{
    ConnectMode, ConnectSource, CountHelper, FieldContext, FieldGenerator, FieldInput,
    InputContext, ModelRecord, ParentChoice, ParentInput, RowInput, RowInputs, UserModel,
    UserModels,
};
use crate::model::GenerationReport;
use crate::pick;
use crate::seed::{PathSegment, SeedPath, display_path};
use crate::serialize::{serialize_row, serialize_value};
use crate::store::{RowId, Store};

/// Longest chain of parents generated on behalf of a single row.
const MAX_PARENT_DEPTH: usize = 32;

/// Recursive row generator for a single top-level generation call.
///
/// Writes every row into the run-local store and the shared store as soon as
/// its identifiers exist, then keeps both copies in sync while the remaining
/// fields are filled.
pub(crate) struct Engine<'a> {
    data_model: &'a DataModel,
    user_models: &'a UserModels,
    fingerprint: &'a Fingerprint,
    connect_mode: Option<&'a ConnectMode>,
    connect_sources: BTreeMap<String, ConnectSource>,
    run_seed: String,
    shared: &'a mut Store,
    local: Store,
    tracker: ConstraintTracker,
    report: GenerationReport,
}

/// Position of a `generate_model` call in the model tree.
#[derive(Debug, Clone)]
pub(crate) struct Call {
    path: Vec<PathSegment>,
    /// Index handed to generators; set when a parent is generated for a row.
    index: Option<usize>,
    /// Linking columns copied from the row that fans out to this model.
    inherited: Option<Row>,
    depth: usize,
}

impl Call {
    pub(crate) fn root(model: &str) -> Self {
        Self {
            path: vec![PathSegment::Name(model.to_string())],
            index: None,
            inherited: None,
            depth: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RowHandle {
    local: RowId,
    shared: RowId,
}

/// Everything known about the row currently being generated.
struct RowSite<'a> {
    model: &'a Model,
    user_model: Option<&'a UserModel>,
    record: ModelRecord,
    seed: SeedPath,
    path: Vec<PathSegment>,
    index: usize,
    generator_index: usize,
    depth: usize,
    handle: Option<RowHandle>,
    /// Parent relations satisfied by a connect source, reused on retries.
    connected: Vec<(&'a ParentField, ConnectSource)>,
}

impl<'a> Engine<'a> {
    pub(crate) fn new(
        data_model: &'a DataModel,
        user_models: &'a UserModels,
        fingerprint: &'a Fingerprint,
        connect_mode: Option<&'a ConnectMode>,
        run_seed: String,
        shared: &'a mut Store,
        max_constraint_attempts: u32,
    ) -> Self {
        let mut connect_sources = BTreeMap::new();
        for name in data_model.models.keys() {
            let user_connect = user_models
                .get(name)
                .and_then(|model| model.connect.clone());
            if let Some(callback) = user_connect {
                connect_sources.insert(name.clone(), ConnectSource::UserProvided(callback));
            } else if connect_mode.is_some()
                && !connect_pool(connect_mode, shared, name).is_empty()
            {
                connect_sources.insert(name.clone(), ConnectSource::DefaultFallback);
            }
        }

        Self {
            data_model,
            user_models,
            fingerprint,
            connect_mode,
            connect_sources,
            report: GenerationReport::new(run_seed.clone()),
            run_seed,
            shared,
            local: Store::new(),
            tracker: ConstraintTracker::new(max_constraint_attempts),
        }
    }

    pub(crate) fn finish(self) -> (Store, GenerationReport) {
        (self.local, self.report)
    }

    /// Generate every row requested by `inputs` for `model_name`.
    pub(crate) fn generate_model(
        &mut self,
        model_name: &str,
        inputs: &RowInputs,
        call: Call,
    ) -> Result<Vec<Row>, GenerationError> {
        let data_model = self.data_model;
        let model = data_model.model(model_name)?;

        let inputs = match inputs {
            RowInputs::One(input) => vec![input.clone()],
            RowInputs::Many(inputs) => inputs.clone(),
            RowInputs::Count(callback) => {
                let seed = SeedPath::for_path(&self.run_seed, &call.path);
                let helper = CountHelper {
                    seed: seed.as_str(),
                    shared: &*self.shared,
                    local: &self.local,
                };
                callback(&helper).map_err(|source| GenerationError::Generator {
                    model: model.name.clone(),
                    path: display_path(&call.path),
                    field: None,
                    source,
                })?
            }
        };

        let mut rows = Vec::with_capacity(inputs.len());
        for (index, input) in inputs.iter().enumerate() {
            rows.push(self.generate_row(model, &call, index, input)?);
        }
        Ok(rows)
    }

    fn generate_row(
        &mut self,
        model: &'a Model,
        call: &Call,
        index: usize,
        input: &RowInput,
    ) -> Result<Row, GenerationError> {
        let data_model = self.data_model;
        let user_models = self.user_models;
        let fields = model.grouped();
        let mut path = call.path.clone();
        path.push(PathSegment::Index(index));
        let seed = SeedPath::for_path(&self.run_seed, &path);

        let mut record = match input {
            RowInput::Record(record) => record.clone(),
            RowInput::Build(builder) => {
                let ctx = InputContext {
                    shared: &*self.shared,
                    local: &self.local,
                    index,
                    seed: seed.as_str(),
                };
                builder(&ctx).map_err(|source| GenerationError::Generator {
                    model: model.name.clone(),
                    path: display_path(&path),
                    field: None,
                    source,
                })?
            }
        };
        // Linking columns from the parent row always win over user input.
        if let Some(inherited) = &call.inherited {
            for (field, value) in inherited {
                record.insert(field, FieldInput::Value(value.clone()));
            }
        }

        let mut site = RowSite {
            model,
            user_model: user_models.get(&model.name),
            record,
            seed,
            path,
            index,
            generator_index: call.index.unwrap_or(index),
            depth: call.depth,
            handle: None,
            connected: Vec::new(),
        };
        let mut row = Row::new();

        for parent in fields.parents.iter().copied() {
            self.resolve_parent(&mut site, parent, &mut row)?;
        }

        for field in fields.scalars.iter().filter(|field| field.is_id) {
            self.generate_scalar(&site, field, &mut row)?;
        }
        site.handle = Some(RowHandle {
            local: self.local.add(&model.name, row.clone()),
            shared: self.shared.add(&model.name, row.clone()),
        });

        let order = generation_order(&fields.scalars, site.user_model, &site.record);
        for field in order.into_iter().filter(|field| !field.is_id) {
            self.generate_scalar(&site, field, &mut row)?;
        }

        let row_path = display_path(&site.path);
        let mut tracker = std::mem::take(&mut self.tracker);
        let pool = tracker
            .needs_pool_scan(&model.name)
            .then(|| self.pool_rows(&model.name));
        let checked = tracker.check(
            &model.name,
            &model.unique_constraints,
            &mut row,
            pool.as_deref(),
            &row_path,
            |constraint, counter, row| self.regenerate(&site, constraint, counter, row),
        );
        self.tracker = tracker;
        let retries = checked?;
        for _ in 0..retries {
            self.report.record_retry(&model.name);
        }

        if let Some(handle) = site.handle {
            self.local.finalize(handle.local);
            self.shared.finalize(handle.shared);
        }

        for child in &fields.children {
            let satisfied_by_parent = fields
                .parents
                .iter()
                .any(|parent| parent.name == child.name && parent.target == child.target);
            if satisfied_by_parent {
                continue;
            }
            let Some(FieldInput::Children(inputs)) = site.record.get(&child.name) else {
                continue;
            };

            let relation = data_model.inverse_relation(child)?;
            let inherited: Row = relation
                .column_pairs()
                .filter_map(|(from, to)| row.get(to).map(|value| (from.to_string(), value.clone())))
                .collect();
            let mut child_path = site.path.clone();
            child_path.push(PathSegment::Name(child.name.clone()));
            self.generate_model(
                &child.target,
                inputs,
                Call {
                    path: child_path,
                    index: None,
                    inherited: Some(inherited),
                    depth: site.depth,
                },
            )?;
        }

        self.report.record_row(&model.name);
        debug!(model = %model.name, path = %row_path, retries, "row generated");
        Ok(row)
    }

    fn resolve_parent(
        &mut self,
        site: &mut RowSite<'a>,
        parent: &'a ParentField,
        row: &mut Row,
    ) -> Result<(), GenerationError> {
        let pinned = parent
            .from_fields
            .iter()
            .all(|field| site.record.literal(field).is_some());
        if pinned {
            for field in &parent.from_fields {
                if let Some(value) = site.record.literal(field) {
                    row.insert(field.clone(), serialize_value(value.clone()));
                }
            }
            return Ok(());
        }

        let override_input = match site.record.get(&parent.name) {
            Some(FieldInput::Parent(input)) => Some(input.clone()),
            _ => None,
        };
        let fallback = self.connect_sources.get(&parent.target).cloned();
        if !parent.is_required && override_input.is_none() && fallback.is_none() {
            for field in &parent.from_fields {
                row.insert(field.clone(), Value::Null);
            }
            return Ok(());
        }

        let seed = site.seed.field(&parent.name);
        let resolved = match override_input {
            Some(ParentInput::Record(record)) => self.create_parent(site, parent, record)?,
            Some(ParentInput::Connect(callback)) => {
                self.connect_parent(site, parent, ConnectSource::UserProvided(callback), &seed)?
            }
            Some(ParentInput::Build(builder)) => {
                let choice_seed = seed.segment(0);
                let ctx = InputContext {
                    shared: &*self.shared,
                    local: &self.local,
                    index: site.index,
                    seed: choice_seed.as_str(),
                };
                let choice = builder(&ctx)
                    .map_err(|source| generator_error(site, Some(&parent.name), source))?;
                match choice {
                    ParentChoice::Create(record) => self.create_parent(site, parent, record)?,
                    ParentChoice::Connect(callback) => self.connect_parent(
                        site,
                        parent,
                        ConnectSource::UserProvided(callback),
                        &seed,
                    )?,
                    ParentChoice::ConnectFallback => {
                        let source = fallback.ok_or_else(|| {
                            unresolvable(
                                site,
                                parent,
                                format!("no connect source configured for '{}'", parent.target),
                            )
                        })?;
                        self.connect_parent(site, parent, source, &seed)?
                    }
                }
            }
            None => match fallback {
                Some(source) => self.connect_parent(site, parent, source, &seed)?,
                None => self.create_parent(site, parent, ModelRecord::new())?,
            },
        };

        for (from, to) in parent.column_pairs() {
            if let Some(value) = resolved.get(to) {
                row.insert(from.to_string(), value.clone());
            }
        }
        Ok(())
    }

    fn create_parent(
        &mut self,
        site: &RowSite<'a>,
        parent: &ParentField,
        record: ModelRecord,
    ) -> Result<Row, GenerationError> {
        if !self.data_model.contains(&parent.target) {
            return Err(unresolvable(
                site,
                parent,
                format!("model '{}' is not part of the data model", parent.target),
            ));
        }
        if site.depth >= MAX_PARENT_DEPTH {
            return Err(unresolvable(
                site,
                parent,
                format!("parent chain deeper than {MAX_PARENT_DEPTH} models"),
            ));
        }

        let mut path = site.path.clone();
        path.push(PathSegment::Name(parent.name.clone()));
        let call = Call {
            path,
            index: Some(site.index),
            inherited: None,
            depth: site.depth + 1,
        };
        let mut rows =
            self.generate_model(&parent.target, &RowInputs::One(RowInput::Record(record)), call)?;
        rows.pop()
            .ok_or_else(|| unresolvable(site, parent, "parent generation produced no row".into()))
    }

    fn connect_parent(
        &self,
        site: &mut RowSite<'a>,
        parent: &'a ParentField,
        source: ConnectSource,
        seed: &SeedPath,
    ) -> Result<Row, GenerationError> {
        let row = self.connect(site, parent, &source, seed)?;
        site.connected.push((parent, source));
        Ok(row)
    }

    fn connect(
        &self,
        site: &RowSite<'a>,
        parent: &ParentField,
        source: &ConnectSource,
        seed: &SeedPath,
    ) -> Result<Row, GenerationError> {
        let row = match source {
            ConnectSource::UserProvided(callback) => {
                let ctx = InputContext {
                    shared: &*self.shared,
                    local: &self.local,
                    index: site.index,
                    seed: seed.as_str(),
                };
                callback(&ctx).map_err(|source| generator_error(site, Some(&parent.name), source))?
            }
            ConnectSource::DefaultFallback => {
                let pool = self.pool_rows(&parent.target);
                pick::one_of(seed.as_str(), &pool).cloned().ok_or_else(|| {
                    unresolvable(
                        site,
                        parent,
                        format!("connect pool for '{}' is empty", parent.target),
                    )
                })?
            }
        };
        Ok(serialize_row(row))
    }

    fn generate_scalar(
        &mut self,
        site: &RowSite<'a>,
        field: &ScalarField,
        row: &mut Row,
    ) -> Result<(), GenerationError> {
        if row.contains_key(&field.name) {
            return Ok(());
        }
        let input = site.record.get(&field.name);
        let explicit = matches!(input, Some(FieldInput::Value(_) | FieldInput::Generate(_)));
        if !field.is_id && field.is_generated {
            return Ok(());
        }
        if !field.is_id && field.has_default_value && !field.sequence && !explicit {
            return Ok(());
        }

        let seed = site.seed.field(&field.name);
        let value = match input {
            Some(FieldInput::Value(value)) => Some(value.clone()),
            Some(FieldInput::Generate(generator)) => {
                Some(self.call_generator(site, field, generator, &seed, row)?)
            }
            _ => match site.user_model.and_then(|model| model.generator(&field.name)) {
                Some(generator) => Some(self.call_generator(site, field, generator, &seed, row)?),
                None => None,
            },
        };

        if let Some(value) = value {
            self.write(site, row, &field.name, serialize_value(value));
        }
        Ok(())
    }

    fn call_generator(
        &self,
        site: &RowSite<'a>,
        field: &ScalarField,
        generator: &FieldGenerator,
        seed: &SeedPath,
        row: &Row,
    ) -> Result<Value, GenerationError> {
        let options = self
            .fingerprint
            .generate_options(&site.model.name, &field.name);
        let ctx = FieldContext {
            index: site.generator_index,
            seed: seed.as_str(),
            data: row,
            shared: &*self.shared,
            local: &self.local,
            options: &options,
        };
        generator(&ctx).map_err(|source| generator_error(site, Some(&field.name), source))
    }

    /// Regenerate the fields of a violated constraint with retry seeds.
    fn regenerate(
        &mut self,
        site: &RowSite<'a>,
        constraint: &UniqueConstraint,
        counter: u32,
        row: &mut Row,
    ) -> Result<(), GenerationError> {
        let mut reconnected: Vec<&str> = Vec::new();
        for field in &constraint.fields {
            let connected = site
                .connected
                .iter()
                .find(|(parent, _)| parent.from_fields.contains(field));
            if let Some((parent, source)) = connected {
                if reconnected.contains(&parent.name.as_str()) {
                    continue;
                }
                reconnected.push(&parent.name);
                let seed = site.seed.retry(&parent.name, counter);
                let resolved = self.connect(site, parent, source, &seed)?;
                for (from, to) in parent.column_pairs() {
                    if let Some(value) = resolved.get(to) {
                        self.write(site, row, from, value.clone());
                    }
                }
                continue;
            }

            // pinned
            if site.record.literal(field).is_some() {
                continue;
            }
            let Some(scalar) = site.model.scalar(field) else {
                continue;
            };
            let generator = match site.record.get(field) {
                Some(FieldInput::Generate(generator)) => Some(generator),
                _ => site.user_model.and_then(|model| model.generator(field)),
            };
            if let Some(generator) = generator {
                let seed = site.seed.retry(field, counter);
                let value = self.call_generator(site, scalar, generator, &seed, row)?;
                self.write(site, row, field, serialize_value(value));
            }
        }
        Ok(())
    }

    fn write(&mut self, site: &RowSite<'a>, row: &mut Row, field: &str, value: Value) {
        if let Some(handle) = site.handle {
            self.local.set(handle.local, field, value.clone());
            self.shared.set(handle.shared, field, value.clone());
        }
        row.insert(field.to_string(), value);
    }

    /// Rows whose constraint tuples are taken before this run checks `model`:
    /// the connect pool plus rows committed to the shared store by earlier runs.
    fn pool_rows(&self, model: &str) -> Vec<Row> {
        let mut rows = connect_pool(self.connect_mode, &*self.shared, model);
        if !matches!(self.connect_mode, Some(ConnectMode::All)) {
            rows.extend(self.shared.completed(model).into_iter().cloned());
        }
        rows
    }
}

fn connect_pool(mode: Option<&ConnectMode>, shared: &Store, model: &str) -> Vec<Row> {
    match mode {
        None => Vec::new(),
        Some(ConnectMode::All) => shared.completed(model).into_iter().cloned().collect(),
        Some(ConnectMode::Pool(pool)) => pool.get(model).cloned().unwrap_or_default(),
    }
}

/// Order in which scalar fields are generated.
///
/// Declared order, then user generator keys, then input keys; a field that
/// appears more than once keeps its last position. Names that are not
/// declared scalars are dropped.
pub(crate) fn generation_order<'m>(
    scalars: &[&'m ScalarField],
    user_model: Option<&UserModel>,
    record: &ModelRecord,
) -> Vec<&'m ScalarField> {
    let declared = scalars.iter().map(|field| field.name.as_str());
    let overrides = user_model.into_iter().flat_map(UserModel::generator_keys);

    let mut keys: Vec<&str> = Vec::new();
    for key in declared.chain(overrides).chain(record.keys()) {
        keys.retain(|existing| *existing != key);
        keys.push(key);
    }

    keys.into_iter()
        .filter_map(|key| scalars.iter().find(|field| field.name == key).copied())
        .collect()
}

fn generator_error(site: &RowSite<'_>, field: Option<&str>, source: BoxError) -> GenerationError {
    GenerationError::Generator {
        model: site.model.name.clone(),
        path: display_path(&site.path),
        field: field.map(str::to_string),
        source,
    }
}

fn unresolvable(site: &RowSite<'_>, parent: &ParentField, reason: String) -> GenerationError {
    GenerationError::UnresolvableRelation {
        model: site.model.name.clone(),
        field: parent.name.clone(),
        path: display_path(&site.path),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_order_keeps_last_position() {
        let a = ScalarField::new("a");
        let b = ScalarField::new("b");
        let c = ScalarField::new("c");
        let scalars = vec![&a, &b, &c];
        let user_model = UserModel::new()
            .generate("c", |_| Ok(Value::Null))
            .generate("a", |_| Ok(Value::Null));
        let record = ModelRecord::new().value("b", 1).value("unknown", 2);

        let order: Vec<_> = generation_order(&scalars, Some(&user_model), &record)
            .into_iter()
            .map(|field| field.name.as_str())
            .collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn generation_order_without_overrides_is_declared_order() {
        let a = ScalarField::new("a");
        let b = ScalarField::new("b");
        let scalars = vec![&a, &b];
        let order: Vec<_> = generation_order(&scalars, None, &ModelRecord::new())
            .into_iter()
            .map(|field| field.name.as_str())
            .collect();
        assert_eq!(order, vec!["a", "b"]);
    }
}
