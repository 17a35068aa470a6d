use std::collections::BTreeSet;

use seedforge_core::{DataModel, Model, ParentField, Row, ScalarField, Value};
use seedforge_generate::{
    ClientState, ConnectMode, GenerateOptions, GenerationError, ModelRecord, Plan, RowInputs,
    UserModel, pick,
};

fn users() -> DataModel {
    DataModel::new([Model::new("User")
        .with_field(ScalarField::id("id"))
        .with_field(ScalarField::new("email"))
        .with_unique(["email"])])
}

/// First attempts always collide; retries fall back to seeded emails.
fn colliding_user_model() -> UserModel {
    UserModel::new()
        .generate("id", |ctx| Ok(Value::Uuid(pick::uuid(ctx.seed))))
        .generate("email", |ctx| {
            if ctx.seed.ends_with("/email") {
                Ok(Value::from("taken@example.com"))
            } else {
                Ok(Value::Text(pick::email(ctx.seed)))
            }
        })
}

#[test]
fn retry_reseeds_with_counter_one() {
    let data_model = users();
    let generated = Plan::new(&data_model, "User", RowInputs::count(2_usize))
        .user_model("User", colliding_user_model())
        .options(GenerateOptions::default().with_seed("retry"))
        .generate(&mut ClientState::new())
        .expect("generate users");

    let users = generated.store.completed("User");
    assert_eq!(users[0].get("email"), Some(&Value::from("taken@example.com")));
    assert_eq!(
        users[1].get("email"),
        Some(&Value::Text(pick::email("retry/User/1/email/1")))
    );
    assert_eq!(generated.report.retries_total, 1);
    assert_eq!(generated.report.model("User").map(|m| m.retries), Some(1));
}

#[test]
fn retried_values_reach_both_stores() {
    let data_model = users();
    let mut state = ClientState::new();
    let generated = Plan::new(&data_model, "User", RowInputs::count(2_usize))
        .user_model("User", colliding_user_model())
        .options(GenerateOptions::default().with_seed("stores"))
        .generate(&mut state)
        .expect("generate users");

    assert_eq!(
        generated.store.completed("User"),
        state.store.completed("User")
    );
}

#[test]
fn earlier_runs_reserve_their_tuples() {
    let data_model = users();
    let mut state = ClientState::new();
    let plan = Plan::new(&data_model, "User", ModelRecord::new())
        .user_model("User", colliding_user_model());

    let first = plan.generate(&mut state).expect("run 0");
    assert_eq!(
        first.store.completed("User")[0].get("email"),
        Some(&Value::from("taken@example.com"))
    );

    let second = plan.generate(&mut state).expect("run 1");
    assert_eq!(
        second.store.completed("User")[0].get("email"),
        Some(&Value::Text(pick::email("1/User/0/email/1")))
    );
    assert_eq!(second.report.retries_total, 1);

    let emails: BTreeSet<_> = state
        .store
        .completed("User")
        .iter()
        .filter_map(|user| user.get("email").map(Value::key))
        .collect();
    assert_eq!(emails.len(), 2);
}

#[test]
fn pinned_values_are_not_regenerated() {
    let data_model = users();
    let err = Plan::new(
        &data_model,
        "User",
        vec![
            ModelRecord::new().value("email", "pinned@example.com"),
            ModelRecord::new().value("email", "pinned@example.com"),
        ],
    )
    .user_model("User", colliding_user_model())
    .options(
        GenerateOptions::default()
            .with_seed("pinned")
            .with_max_constraint_attempts(3),
    )
    .generate(&mut ClientState::new())
    .expect_err("pinned duplicates cannot be repaired");

    assert!(matches!(
        err,
        GenerationError::ConstraintExhausted { attempts: 3, .. }
    ));
}

#[test]
fn connect_pool_tuples_are_reserved() {
    let data_model = users();
    let pool = ConnectMode::Pool(
        [(
            "User".to_string(),
            vec![Row::from([
                ("id".to_string(), Value::from("existing")),
                ("email".to_string(), Value::from("taken@example.com")),
            ])],
        )]
        .into(),
    );

    let generated = Plan::new(&data_model, "User", ModelRecord::new())
        .user_model("User", colliding_user_model())
        .options(GenerateOptions::default().with_seed("pool"))
        .connect(pool)
        .generate(&mut ClientState::new())
        .expect("generate user");

    assert_eq!(
        generated.store.completed("User")[0].get("email"),
        Some(&Value::Text(pick::email("pool/User/0/email/1")))
    );
}

#[test]
fn connected_parents_are_resampled_on_retry() {
    let data_model = DataModel::new([
        Model::new("User").with_field(ScalarField::id("id")),
        Model::new("Profile")
            .with_field(ScalarField::id("id"))
            .with_field(ScalarField::new("userId"))
            .with_field(ParentField::new("user", "User", "ProfileToUser").columns("userId", "id"))
            .with_unique(["userId"]),
    ]);
    let user_model = UserModel::new().generate("id", |ctx| Ok(Value::Uuid(pick::uuid(ctx.seed))));
    let profile_model =
        UserModel::new().generate("id", |ctx| Ok(Value::Uuid(pick::uuid(ctx.seed))));

    let mut state = ClientState::new();
    let created = Plan::new(&data_model, "User", RowInputs::count(3_usize))
        .user_model("User", user_model)
        .generate(&mut state)
        .expect("generate users");
    let user_ids: BTreeSet<_> = created
        .store
        .completed("User")
        .iter()
        .filter_map(|user| user.get("id").map(Value::key))
        .collect();

    let profiles = Plan::new(&data_model, "Profile", RowInputs::count(3_usize))
        .user_model("Profile", profile_model)
        .options(GenerateOptions::default().with_seed("profiles"))
        .connect(ConnectMode::All)
        .generate(&mut state)
        .expect("one profile per user");

    let linked: BTreeSet<_> = profiles
        .store
        .completed("Profile")
        .iter()
        .filter_map(|profile| profile.get("userId").map(Value::key))
        .collect();
    assert!(profiles.store.rows("User").is_empty());
    assert_eq!(linked, user_ids);
}
