//! Purpose: Hold top-level CLI command dispatch for `mapconv`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Array inputs convert element-wise; a failing element names its index.
//! Invariants: Nothing is written to stdout unless every element converted.

use super::*;

pub(super) fn dispatch_command(command: Command) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "mapconv", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Check { mapping, pretty } => {
            let mapping = load_mapping(&mapping)?;
            emit_json(&mapping.describe()?, pretty);
            Ok(RunOutcome::ok())
        }
        Command::To(args) => convert_command(&args, Mapping::to_naked),
        Command::From(args) => convert_command(&args, Mapping::from_naked),
    }
}

type ConvertFn = fn(&Mapping, &Value, &mut Value) -> Result<(), Error>;

fn convert_command(args: &ConvertArgs, convert: ConvertFn) -> Result<RunOutcome, Error> {
    let mapping = load_mapping(&args.mapping)?;
    let input = read_json(args.input.as_deref())?;
    let into = args
        .into
        .as_deref()
        .map(|path| read_json(Some(path)))
        .transpose()?;

    let output = match input {
        Value::Object(_) => {
            let mut dest = into.unwrap_or(Value::Null);
            convert(&mapping, &input, &mut dest)?;
            dest
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (idx, item) in items.iter().enumerate() {
                let mut dest = starting_element(into.as_ref(), idx);
                convert(&mapping, item, &mut dest).map_err(|err| err.in_field(&idx.to_string()))?;
                out.push(dest);
            }
            Value::Array(out)
        }
        _ => {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("input must be a JSON object or an array of objects")
                .with_hint("Wrap a single document in `{}` or a list in `[]`."));
        }
    };
    tracing::debug!(input = ?args.input, "converted input");
    emit_json(&output, args.pretty);
    Ok(RunOutcome::ok())
}

/// Destination for the `idx`-th element: an object `--into` seeds every element, an array
/// seeds elements by position.
fn starting_element(into: Option<&Value>, idx: usize) -> Value {
    match into {
        Some(Value::Array(seeds)) => seeds.get(idx).cloned().unwrap_or(Value::Null),
        Some(seed) => seed.clone(),
        None => Value::Null,
    }
}
