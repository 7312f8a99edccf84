use std::path::Path;

use crate::config::{Overrides, PyxConfig};
use crate::{fail, OutputFormat};

pub(crate) fn cmd_check(file: &Path, config: Option<&Path>, output: OutputFormat, quiet: bool) {
    let result = PyxConfig::load(config, file)
        .and_then(|cfg| cfg.emit_options(&Overrides::default()))
        .and_then(|opts| pyx_core::transpile(file, &opts));

    match result {
        Ok(_) => {
            if !quiet {
                match output {
                    OutputFormat::Text => println!("ok"),
                    OutputFormat::Json => println!("{{\"valid\": true}}"),
                }
            }
        }
        Err(e) => fail(&e, output, quiet),
    }
}
