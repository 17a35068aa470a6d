use std::env;
use std::path::PathBuf;

use seedforge_core::{DataModel, Value};
use seedforge_generate::output::write_store_csv;
use seedforge_generate::{
    ClientState, GenerateOptions, LogFormat, Plan, RowInputs, UserModel, UserModels, init_logging,
    pick, to_statements,
};

/// Name-based generator for every scalar field of every model.
fn user_models(data_model: &DataModel) -> UserModels {
    data_model
        .models
        .values()
        .map(|model| {
            let user_model = model.grouped().scalars.iter().fold(
                UserModel::new(),
                |user_model, field| {
                    let name = field.name.to_lowercase();
                    if field.is_id || name.ends_with("id") {
                        user_model.generate(&field.name, |ctx| Ok(Value::Uuid(pick::uuid(ctx.seed))))
                    } else if name.contains("email") {
                        user_model.generate(&field.name, |ctx| Ok(Value::Text(pick::email(ctx.seed))))
                    } else if name.contains("name") {
                        user_model
                            .generate(&field.name, |ctx| Ok(Value::Text(pick::first_name(ctx.seed))))
                    } else {
                        user_model.generate(&field.name, |ctx| Ok(Value::Text(pick::words(ctx.seed, 3))))
                    }
                },
            );
            (model.name.clone(), user_model)
        })
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let mut schema_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut model: Option<String> = None;
    let mut count = 10_usize;
    let mut out_dir = PathBuf::from("out");
    let mut seed: Option<String> = None;
    let mut log_format = LogFormat::Pretty;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--schema" => schema_path = args.next().map(PathBuf::from),
            "--config" => config_path = args.next().map(PathBuf::from),
            "--model" => model = args.next(),
            "--count" => count = args.next().ok_or("missing --count value")?.parse()?,
            "--out" => out_dir = args.next().map(PathBuf::from).ok_or("missing --out value")?,
            "--seed" => seed = args.next(),
            "--json-logs" => log_format = LogFormat::Json,
            _ => return Err(format!("unexpected argument '{arg}'").into()),
        }
    }

    init_logging(log_format, "info", None)?;

    let schema_path = schema_path.ok_or("missing --schema path")?;
    let model = model.ok_or("missing --model name")?;
    let data_model = DataModel::from_json_str(&std::fs::read_to_string(&schema_path)?)?;

    let mut options = match config_path {
        Some(path) => GenerateOptions::load(&path)?,
        None => GenerateOptions::default(),
    };
    if seed.is_some() {
        options.seed = seed;
    }

    let plan = Plan::new(&data_model, &model, RowInputs::count(count))
        .user_models(user_models(&data_model))
        .options(options);
    let generated = plan.generate(&mut ClientState::new())?;

    let bytes = write_store_csv(&out_dir, &data_model, &generated.store)?;
    let statements = to_statements(&data_model, &generated.store)?;

    println!("{}", serde_json::to_string_pretty(&generated.report)?);
    println!(
        "out_dir={} bytes_written={bytes} statements={}",
        out_dir.display(),
        statements.len()
    );
    Ok(())
}
