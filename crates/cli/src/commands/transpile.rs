use std::path::Path;

use pyx_core::{default_output_path, OutputTarget};

use crate::config::{Overrides, PyxConfig};
use crate::{fail, OutputFormat};

pub(crate) struct TranspileArgs<'a> {
    pub file: &'a Path,
    pub out: Option<&'a Path>,
    pub stdout: bool,
    pub config: Option<&'a Path>,
    pub overrides: &'a Overrides,
    pub output: OutputFormat,
    pub quiet: bool,
}

pub(crate) fn cmd_transpile(args: TranspileArgs<'_>) {
    let opts = match PyxConfig::load(args.config, args.file)
        .and_then(|cfg| cfg.emit_options(args.overrides))
    {
        Ok(opts) => opts,
        Err(e) => fail(&e, args.output, args.quiet),
    };

    let text = match pyx_core::transpile(args.file, &opts) {
        Ok(text) => text,
        Err(e) => fail(&e, args.output, args.quiet),
    };

    let target = if args.stdout {
        OutputTarget::Stdout
    } else {
        OutputTarget::File(
            args.out
                .map(Path::to_path_buf)
                .unwrap_or_else(|| default_output_path(args.file)),
        )
    };
    if let Err(e) = target.write(&text) {
        fail(&e, args.output, args.quiet);
    }

    if let OutputTarget::File(path) = &target {
        if !args.quiet {
            match args.output {
                OutputFormat::Text => println!("wrote {}", path.display()),
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::json!({ "status": "ok", "output": path.display().to_string() })
                ),
            }
        }
    }
}
