use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{Arg, CommandFactory, Parser, Subcommand};
use std::ffi::OsString;
use std::ops::Range;
use std::path::PathBuf;
use tile_stitch::config::{self, CliOverrides, ConfigError};
use tile_stitch::{output, scan, stitch};

#[derive(Parser, Debug)]
#[command(name = "tile-stitch")]
#[command(about = "Stitch a grid of micrograph tiles into one image")]
#[command(long_about = "\
Stitch a grid of micrograph tiles into one image

Every .tif (or every .png) in the working directory is a tile. Tiles are
sorted by file name and fill the grid left to right, then top to bottom
(or top to bottom, then left to right with --vertical). The tile count must
equal columns x rows.

  sample-042/
  ├── stitch.toml        # Optional settings (see gen-config)
  ├── tile_00.tif
  ├── tile_01.tif
  ├── tile_02.tif
  └── tile_03.tif

The result is written next to the directory as sample-042.tif, with the
physical pixel scale of the first tile embedded for ImageJ/Fiji.

Run 'tile-stitch gen-config' to generate a documented stitch.toml.")]
#[command(version)]
struct Cli {
    /// Directory holding the tiles
    #[arg(short = 'w', long, default_value = ".")]
    working_dir: PathBuf,

    /// Tiles per row (rows mirror this when not given)
    #[arg(short = 'x', long)]
    columns: Option<u32>,

    /// Tiles per column (columns mirror this when not given)
    #[arg(short = 'y', long)]
    rows: Option<u32>,

    /// Shrink every tile by this factor before stitching, e.g. 0.5
    #[arg(short = 's', long = "scale")]
    scale: Option<f64>,

    /// Fill the grid column by column
    #[arg(short = 'v', long)]
    vertical: bool,

    /// Also write a thumbnail for wide results
    #[arg(short = 't', long)]
    thumbnail: bool,

    /// Open the result in the system viewer
    #[arg(short = 'o', long)]
    open: bool,

    /// Print every tile as it is loaded and placed
    #[arg(short = 'd', long)]
    debug: bool,

    /// Crop the result to this width (top-left anchored)
    #[arg(long)]
    crop_width: Option<u32>,

    /// Crop the result to this height (needs --crop-width)
    #[arg(long)]
    crop_height: Option<u32>,

    /// Directory for the result [default: parent of the working directory]
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Result base name [default: name of the working directory]
    #[arg(long)]
    name: Option<String>,

    /// Grid slot (0-based) without a tile; repeatable
    #[arg(short = 'e', long = "empty")]
    empty: Vec<usize>,

    /// Abort on malformed options instead of ignoring them
    #[arg(long)]
    strict: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a stock stitch.toml with all options documented
    GenConfig,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            columns: self.columns,
            rows: self.rows,
            vertical: self.vertical,
            scale_factor: self.scale,
            thumbnail: self.thumbnail,
            open: self.open,
            crop_width: self.crop_width,
            crop_height: self.crop_height,
            output_directory: self.output_dir.clone(),
            name: self.name.clone(),
            empty_slots: self.empty.clone(),
        }
    }
}

/// Parse `args` (program name first). A malformed option is dropped with a
/// warning and the rest is parsed again, unless `--strict` is present.
fn parse_cli_from(args: &[OsString]) -> Result<(Cli, Vec<ConfigError>), clap::Error> {
    let strict = args.iter().any(|a| a == "--strict");
    let cmd = Cli::command();
    let mut args = args.to_vec();
    let mut ignored = Vec::new();
    loop {
        let error = match Cli::try_parse_from(&args) {
            Ok(cli) => return Ok((cli, ignored)),
            Err(e) => e,
        };
        if strict
            || matches!(
                error.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            )
        {
            return Err(error);
        }
        let Some(range) = offending_tokens(&error, &cmd, &args) else {
            return Err(error);
        };
        let dropped: Vec<String> = args
            .drain(range)
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        ignored.push(ConfigError::UnsupportedOption(format!(
            "ignored `{}`: {}",
            dropped.join(" "),
            clap_message(&error)
        )));
    }
}

/// Locate the tokens a parse error refers to. Index 0 (program name) is never
/// returned.
fn offending_tokens(
    error: &clap::Error,
    cmd: &clap::Command,
    args: &[OsString],
) -> Option<Range<usize>> {
    let context = |kind| match error.get(kind) {
        Some(ContextValue::String(s)) => Some(s.as_str()),
        _ => None,
    };
    let tokens: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();

    if let Some(word) = context(ContextKind::InvalidSubcommand) {
        return (1..tokens.len())
            .find(|&i| tokens[i] == word && !takes_value(cmd, &tokens[i - 1]))
            .map(|i| i..i + 1);
    }

    let names = option_names(cmd, context(ContextKind::InvalidArg)?);
    let is_name = |token: &str| names.iter().any(|n| n == token);

    match context(ContextKind::InvalidValue).filter(|v| !v.is_empty()) {
        // `-x abc`, `-xabc`, `-x=abc`, `--columns=abc`
        Some(value) => (1..tokens.len()).rev().find_map(|i| {
            let attached = names.iter().any(|n| {
                tokens[i]
                    .strip_prefix(n.as_str())
                    .is_some_and(|rest| rest == value || rest.strip_prefix('=') == Some(value))
            });
            if tokens[i] == value && is_name(&tokens[i - 1]) {
                Some(i - 1..i + 1)
            } else if attached {
                Some(i..i + 1)
            } else {
                None
            }
        }),
        // Unknown option, or an option missing its value.
        None => (1..tokens.len())
            .rev()
            .find(|&i| {
                let token = &tokens[i];
                is_name(token)
                    || names.iter().any(|n| {
                        token.starts_with(&format!("{n}="))
                            || (n.len() == 2
                                && token.starts_with('-')
                                && !token.starts_with("--")
                                && token[1..].contains(&n[1..]))
                    })
            })
            .map(|i| i..i + 1),
    }
}

/// Every spelling (`--long`, `-s`) of the option a clap error names, e.g.
/// `"--columns <COLUMNS>"`. Unknown options map to themselves.
fn option_names(cmd: &clap::Command, display: &str) -> Vec<String> {
    let Some(word) = display.split_whitespace().next() else {
        return Vec::new();
    };
    match cmd.get_arguments().find(|a| spells(a, word)) {
        Some(arg) => arg
            .get_long()
            .map(|l| format!("--{l}"))
            .into_iter()
            .chain(arg.get_short().map(|s| format!("-{s}")))
            .collect(),
        None => vec![word.to_string()],
    }
}

fn spells(arg: &Arg, token: &str) -> bool {
    arg.get_long().is_some_and(|l| token == format!("--{l}"))
        || arg.get_short().is_some_and(|s| token == format!("-{s}"))
}

/// Whether `token` is an option that consumes the next argument.
fn takes_value(cmd: &clap::Command, token: &str) -> bool {
    cmd.get_arguments()
        .any(|a| a.get_action().takes_values() && spells(a, token))
}

/// First line of a clap error without the `error: ` prefix.
fn clap_message(error: &clap::Error) -> String {
    let text = error.to_string();
    let line = text.lines().next().unwrap_or_default();
    line.strip_prefix("error: ").unwrap_or(line).to_string()
}

fn parse_cli() -> Result<(Cli, Vec<ConfigError>), ConfigError> {
    let args: Vec<OsString> = std::env::args_os().collect();
    parse_cli_from(&args).map_err(|error| {
        if matches!(
            error.kind(),
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
        ) {
            error.exit();
        }
        ConfigError::UnsupportedOption(clap_message(&error))
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (cli, ignored) = parse_cli()?;
    for warning in &ignored {
        eprintln!("Warning: {warning}");
    }

    if let Some(Command::GenConfig) = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    println!("==> Stage 1: Scanning {}", cli.working_dir.display());
    let tiles = scan::enumerate(&cli.working_dir)?;
    let config = cli.overrides().apply(config::load_config(&tiles.directory)?);
    config.validate()?;
    let tiles = tiles.with_empty_slots(&config.empty_slots);
    output::print_scan_summary(&tiles);

    println!("==> Stage 2: Stitching");
    output::print_config_summary(&config);
    let result = stitch::stitch(&tiles, &config, |event| {
        output::print_stitch_event(event, cli.debug)
    })?;

    if config.output.open {
        if let Err(e) = stitch::open_in_viewer(&result.output) {
            eprintln!(
                "Warning: could not open {}: {}",
                result.output.display(),
                e
            );
        }
    }

    println!("==> Done: {}", result.output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<OsString> {
        std::iter::once("tile-stitch")
            .chain(list.iter().copied())
            .map(OsString::from)
            .collect()
    }

    fn lenient(list: &[&str]) -> (Cli, Vec<ConfigError>) {
        parse_cli_from(&args(list)).unwrap()
    }

    fn messages(ignored: &[ConfigError]) -> Vec<String> {
        ignored.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    // =========================================================================
    // Lenient parsing
    // =========================================================================

    #[test]
    fn well_formed_options_parse_without_warnings() {
        let (cli, ignored) = lenient(&["-x", "3", "-y", "2", "-e", "1", "-e", "2", "-v"]);
        assert!(ignored.is_empty());
        assert_eq!((cli.columns, cli.rows), (Some(3), Some(2)));
        assert_eq!(cli.empty, vec![1, 2]);
        assert!(cli.vertical);
    }

    #[test]
    fn bad_value_keeps_following_options() {
        let (cli, ignored) = lenient(&["-x", "abc", "-y", "3"]);
        assert_eq!((cli.columns, cli.rows), (None, Some(3)));
        assert_eq!(ignored.len(), 1);
        assert!(messages(&ignored)[0].contains("`-x abc`"));
    }

    #[test]
    fn bad_value_keeps_working_dir() {
        let (cli, _) = lenient(&["-x", "abc", "-w", "/data/tiles"]);
        assert_eq!(cli.working_dir, PathBuf::from("/data/tiles"));
        assert_eq!(cli.columns, None);
    }

    #[test]
    fn bad_scale_keeps_trailing_flag() {
        let (cli, ignored) = lenient(&["-s", "half", "-t"]);
        assert!(cli.thumbnail);
        assert_eq!(cli.scale, None);
        assert_eq!(ignored.len(), 1);
    }

    #[test]
    fn attached_bad_value_dropped_alone() {
        let (cli, ignored) = lenient(&["--columns=abc", "-y", "2"]);
        assert_eq!((cli.columns, cli.rows), (None, Some(2)));
        assert!(messages(&ignored)[0].contains("`--columns=abc`"));
    }

    #[test]
    fn unknown_option_dropped() {
        let (cli, ignored) = lenient(&["--bogus", "-x", "3"]);
        assert_eq!(cli.columns, Some(3));
        assert!(messages(&ignored)[0].contains("`--bogus`"));
    }

    #[test]
    fn option_missing_its_value_dropped() {
        let (cli, ignored) = lenient(&["-y", "2", "-x"]);
        assert_eq!((cli.columns, cli.rows), (None, Some(2)));
        assert_eq!(ignored.len(), 1);
    }

    #[test]
    fn stray_word_dropped() {
        let (cli, ignored) = lenient(&["extra", "-x", "2"]);
        assert_eq!(cli.columns, Some(2));
        assert!(cli.command.is_none());
        assert!(messages(&ignored)[0].contains("`extra`"));
    }

    #[test]
    fn each_malformed_option_reported_once() {
        let (cli, ignored) = lenient(&["-x", "abc", "--bogus", "-s", "half", "-v", "-y", "4"]);
        assert_eq!(ignored.len(), 3);
        assert!(cli.vertical);
        assert_eq!((cli.columns, cli.rows, cli.scale), (None, Some(4), None));
    }

    #[test]
    fn gen_config_subcommand() {
        let (cli, ignored) = lenient(&["gen-config"]);
        assert!(ignored.is_empty());
        assert!(matches!(cli.command, Some(Command::GenConfig)));
    }

    // =========================================================================
    // Strict parsing and early exits
    // =========================================================================

    #[test]
    fn strict_rejects_malformed_option() {
        let error = parse_cli_from(&args(&["--strict", "-x", "abc", "-y", "3"])).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ValueValidation);
        assert!(clap_message(&error).contains("abc"));
    }

    #[test]
    fn strict_accepts_well_formed_options() {
        let (cli, ignored) = parse_cli_from(&args(&["--strict", "-x", "2"])).unwrap();
        assert!(cli.strict);
        assert!(ignored.is_empty());
    }

    #[test]
    fn help_is_passed_through() {
        let error = parse_cli_from(&args(&["-x", "abc", "--help"])).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::DisplayHelp);
    }
}
