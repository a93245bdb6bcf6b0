use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};

use shaderlift::emit::parse_signature;
use shaderlift::token::{split_functions, tokenize};
use shaderlift::{Error, GpuContext, HostBuffer, KernelRunner, ScalarKind, Session, WgslType};

#[derive(Parser)]
#[command(
    name = "shaderlift",
    version,
    about = "Translate restricted numeric kernels to WGSL and run them on the GPU"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Translate a source file to WGSL without touching the GPU
    Translate(TranslateArgs),
    /// Translate, build, dispatch, and print the read-back results
    Run(RunArgs),
}

#[derive(Args)]
struct TranslateArgs {
    /// Input file of function definitions
    input: PathBuf,
    #[command(flatten)]
    translation: TranslationFlags,
    /// Print the per-function variable tables as JSON and exit
    #[arg(long)]
    dump_types: bool,
    /// Output .wgsl file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct RunArgs {
    /// Input file of function definitions
    input: PathBuf,
    #[command(flatten)]
    translation: TranslationFlags,
    /// Input buffer, e.g. myBuffer=0,-1,-2,-3 or counts:u32=1,2 (repeatable)
    #[arg(long = "input-buffer", value_name = "NAME[:KIND]=CSV")]
    input_buffers: Vec<String>,
    /// Output buffer linked to an input, e.g. result=myBuffer (repeatable)
    #[arg(long = "output-buffer", value_name = "NAME=INPUT")]
    output_buffers: Vec<String>,
    /// Workgroup counts for the dispatch, e.g. 4 or 4,1,1
    #[arg(long, value_delimiter = ',', default_value = "1")]
    dispatch: Vec<u32>,
}

#[derive(Args)]
struct TranslationFlags {
    /// Entry-point function name (defaults to the last function in the file)
    #[arg(long)]
    entry: Option<String>,
    /// Workgroup size components, e.g. 4 or 2,2
    #[arg(long, value_delimiter = ',', default_value = "1")]
    workgroup: Vec<u32>,
    /// Return type for helper functions
    #[arg(long, default_value = "f32")]
    return_type: String,
    /// Type correction applied before regeneration, e.g. main_kernel.i=u32
    /// (repeatable)
    #[arg(long = "set-type", value_name = "FN.VAR=TYPE")]
    set_types: Vec<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Translate(args) => cmd_translate(args),
        Command::Run(args) => cmd_run(args),
    }
}

fn read_source(path: &PathBuf) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("error: cannot read {}: {e}", path.display());
        process::exit(1);
    })
}

fn fail(err: Error, filename: &str, source: &str) -> ! {
    err.render(filename, source);
    process::exit(1);
}

/// Translate every function in `source` into `session`, treating the
/// named (or last) function as the compute entry point. Helper parameters
/// default to f32; corrections go through `--set-type`.
fn translate_all(
    session: &mut Session,
    source: &str,
    flags: &TranslationFlags,
) -> shaderlift::Result<()> {
    let return_type = WgslType::parse(&flags.return_type)?;
    let functions = split_functions(source);
    let mut parsed = Vec::with_capacity(functions.len());
    for text in &functions {
        let lines = tokenize(text)?;
        let sig = parse_signature(&lines[0])?;
        parsed.push((text, sig));
    }
    let Some(last) = parsed.last() else {
        return Err(Error::MalformedSource {
            message: "no function definitions found in input".to_string(),
            line: 1,
            span: shaderlift::span::Span::dummy(),
        });
    };
    let entry_name = flags.entry.clone().unwrap_or_else(|| last.1.name.clone());

    for (text, sig) in &parsed {
        if sig.name == entry_name {
            session.translate_entry(text.as_str(), &flags.workgroup)?;
        } else {
            let types = vec![WgslType::Scalar(ScalarKind::F32); sig.params.len()];
            session.translate_function(text.as_str(), return_type, &types)?;
        }
    }

    for spec in &flags.set_types {
        let (target, ty) = spec.split_once('=').ok_or_else(|| {
            Error::UnsupportedType(format!("bad --set-type `{spec}`, expected FN.VAR=TYPE"))
        })?;
        let (function, variable) = target.split_once('.').ok_or_else(|| {
            Error::UnsupportedType(format!("bad --set-type `{spec}`, expected FN.VAR=TYPE"))
        })?;
        session.submit_edit(function, variable, ty)?;
    }
    session.confirm()?;
    Ok(())
}

fn cmd_translate(args: TranslateArgs) {
    let filename = args.input.display().to_string();
    let source = read_source(&args.input);
    let mut session = Session::new();
    if let Err(e) = translate_all(&mut session, &source, &args.translation) {
        fail(e, &filename, &source);
    }

    if args.dump_types {
        let mut doc = serde_json::Map::new();
        for name in session.functions().map(str::to_string).collect::<Vec<_>>() {
            let vars = session
                .list_variables(&name)
                .unwrap_or_else(|e| fail(e, &filename, &source));
            doc.insert(
                name,
                serde_json::to_value(vars).expect("type tables serialize to JSON"),
            );
        }
        println!("{}", serde_json::Value::Object(doc));
        return;
    }

    let wgsl = session.assemble("");
    match &args.output {
        Some(path) => {
            if let Err(e) = fs::write(path, &wgsl) {
                eprintln!("error: cannot write {}: {e}", path.display());
                process::exit(1);
            }
        }
        None => print!("{wgsl}"),
    }
}

fn cmd_run(args: RunArgs) {
    let filename = args.input.display().to_string();
    let source = read_source(&args.input);

    // Fail fast on the device before doing any translation work.
    let ctx = match GpuContext::acquire() {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    let mut session = Session::new();
    if let Err(e) = translate_all(&mut session, &source, &args.translation) {
        fail(e, &filename, &source);
    }
    let mut runner = KernelRunner::with_session(ctx, session);

    let mut registered: Vec<(String, HostBuffer)> = Vec::new();
    for spec in &args.input_buffers {
        let (name, data) = parse_buffer_spec(spec).unwrap_or_else(|msg| {
            eprintln!("error: {msg}");
            process::exit(1);
        });
        if let Err(e) = runner.register_input(&name, &data, 0) {
            fail(e, &filename, &source);
        }
        registered.push((name, data));
    }
    for spec in &args.output_buffers {
        let Some((name, linked)) = spec.split_once('=') else {
            eprintln!("error: bad --output-buffer `{spec}`, expected NAME=INPUT");
            process::exit(1);
        };
        let Some(sizing) = registered
            .iter()
            .find(|(n, _)| n.as_str() == linked)
            .map(|(_, d)| d)
        else {
            eprintln!("error: output `{name}` links to unregistered input `{linked}`");
            process::exit(1);
        };
        let sizing = sizing.clone();
        if let Err(e) = runner.register_output(name, linked, &sizing) {
            fail(e, &filename, &source);
        }
    }

    let mut counts = [1u32; 3];
    for (slot, value) in counts.iter_mut().zip(&args.dispatch) {
        *slot = *value;
    }

    match execute(&mut runner, counts) {
        Ok(results) => {
            for (name, data) in results {
                println!("{name} = [{}]", format_host(&data));
            }
        }
        Err(e) => fail(e, &filename, &source),
    }
}

fn execute(
    runner: &mut KernelRunner,
    counts: [u32; 3],
) -> shaderlift::Result<Vec<(String, HostBuffer)>> {
    runner.build()?;
    runner.dispatch(counts)?;
    runner.read_back()
}

fn parse_buffer_spec(spec: &str) -> Result<(String, HostBuffer), String> {
    let (head, csv) = spec
        .split_once('=')
        .ok_or_else(|| format!("bad --input-buffer `{spec}`, expected NAME[:KIND]=CSV"))?;
    let (name, kind) = match head.split_once(':') {
        Some((name, kind)) => (name, kind),
        None => (head, "f32"),
    };
    let data = match kind {
        "f32" => HostBuffer::F32(parse_csv(csv)?),
        "i32" => HostBuffer::I32(parse_csv(csv)?),
        "u32" => HostBuffer::U32(parse_csv(csv)?),
        other => return Err(format!("unsupported buffer kind `{other}`")),
    };
    Ok((name.to_string(), data))
}

fn parse_csv<T: std::str::FromStr>(csv: &str) -> Result<Vec<T>, String>
where
    T::Err: std::fmt::Display,
{
    csv.split(',')
        .map(|v| v.trim().parse::<T>().map_err(|e| format!("bad value `{v}`: {e}")))
        .collect()
}

fn format_host(data: &HostBuffer) -> String {
    fn join<T: std::fmt::Display>(values: &[T]) -> String {
        values
            .iter()
            .map(T::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
    match data {
        HostBuffer::F32(v) => join(v),
        HostBuffer::I32(v) => join(v),
        HostBuffer::U32(v) => join(v),
        HostBuffer::F64(v) => join(v),
        HostBuffer::I64(v) => join(v),
    }
}
