use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use rustsqlmap::scripting::{CompileOptions, Parameter, ScriptCompiler};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rustsqlmap")]
#[command(about = "Preview dynamic SQL templates")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a template against JSON parameters
    Render {
        template: PathBuf,
        /// Inline JSON parameter object
        #[arg(long, conflicts_with = "params_file")]
        params: Option<String>,
        #[arg(long)]
        params_file: Option<PathBuf>,
        #[arg(long)]
        database_id: Option<String>,
        /// Collapse whitespace runs in the rendered SQL
        #[arg(long)]
        shrink: bool,
        /// Treat `<foreach>` over null as empty unless it says otherwise
        #[arg(long)]
        nullable_foreach: bool,
    },
    /// Compile a template and report errors only
    Check { template: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Render {
            template,
            params,
            params_file,
            database_id,
            shrink,
            nullable_foreach,
        } => {
            let options = CompileOptions {
                shrink_whitespace: shrink,
                nullable_on_for_each: nullable_foreach,
            };
            let parameter = load_parameter(params.as_deref(), params_file.as_deref())?;
            render(&template, options, &parameter, database_id.as_deref())
        }
        Command::Check { template } => {
            let source = read_template(&template)?;
            ScriptCompiler::default()
                .compile(&source)
                .map_err(|e| anyhow!("{}: {}", template.display(), e))?;
            println!("{}: ok", template.display());
            Ok(())
        }
    }
}

fn read_template(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read template '{}'", path.display()))
}

fn load_parameter(inline: Option<&str>, file: Option<&Path>) -> Result<Parameter> {
    let json = match (inline, file) {
        (Some(json), _) => json.to_string(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read parameters '{}'", path.display()))?,
        (None, None) => return Ok(Parameter::none()),
    };
    let value: serde_json::Value =
        serde_json::from_str(&json).context("Parameters must be valid JSON")?;
    Ok(Parameter::from(value))
}

fn render(
    template: &Path,
    options: CompileOptions,
    parameter: &Parameter,
    database_id: Option<&str>,
) -> Result<()> {
    let source = read_template(template)?;
    let sql_source = ScriptCompiler::new(options)
        .compile(&source)
        .map_err(|e| anyhow!("{}: {}", template.display(), e))?;
    let command = sql_source
        .bound_command(parameter, database_id)
        .map_err(|e| anyhow!("{}", e))?;

    println!("{}", command.sql);
    for (i, (mapping, value)) in command
        .parameter_mappings
        .iter()
        .zip(command.values.iter())
        .enumerate()
    {
        println!("  {:>2}: {} = {} ({}, {})", i + 1, mapping.property, value, value.type_name(), mapping.mode);
    }
    Ok(())
}
