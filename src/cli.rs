use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser, Clone)]
#[command(name = "scriptfilter")]
#[command(about = "Run a synthetic video stream through a Rhai script filter")]
pub struct Cli {
    /// TOML config file. Defaults to the platform config file, if one exists.
    #[arg(long, conflicts_with = "options")]
    pub config: Option<PathBuf>,

    /// Node options, e.g. `module=invert:filter_function=filter`.
    #[arg(long)]
    pub options: Option<String>,

    /// Number of frames to generate.
    #[arg(long, default_value_t = 100)]
    pub frames: u64,

    /// Frame width in pixels.
    #[arg(long, default_value_t = 320)]
    pub width: u32,

    /// Frame height in pixels.
    #[arg(long, default_value_t = 240)]
    pub height: u32,

    /// Frame rate; the time base is 1/fps.
    #[arg(long, default_value_t = 25)]
    pub fps: u32,

    /// Extra module directory, searched before configured paths. Repeatable.
    #[arg(long = "module-path")]
    pub module_paths: Vec<PathBuf>,

    /// Stop on the first filter hook fault instead of logging it.
    #[arg(long)]
    pub fail_on_error: bool,

    /// Print the node options and exit.
    #[arg(long)]
    pub list_options: bool,
}
