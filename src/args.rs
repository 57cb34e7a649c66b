use clap::{Args, Subcommand};

#[derive(Debug, clap::Parser)]
#[clap(author, version, about)]
pub struct ChukCliArgs {
    #[clap(subcommand)]
    pub subcmd: Subaction,
}

#[derive(Debug, Subcommand)]
pub enum Subaction {
    /// checks a NetCDF4 or GeoTIFF file against the CHUK grid and metadata conventions
    Check(CheckCommand),

    /// checks a CHUK NetCDF4 file and exports one of its variables to GeoTIFF
    Export(ExportCommand),

    /// creates a lower resolution sample of a CHUK NetCDF4 file
    Sample(SampleCommand),

    /// builds a mask from the categories of an auxiliary layer
    Mask(MaskCommand),
}

#[derive(Debug, Args)]
pub struct CheckCommand {
    /// the file to check
    pub input: String,

    /// the CHUK grid reference file
    #[clap(short, long, env = "CHUK_GRID_PATH")]
    pub grid: String,
}

#[derive(Debug, Args)]
pub struct ExportCommand {
    /// the input CHUK NetCDF4 file
    pub input: String,

    /// the variable to export
    pub variable: String,

    /// the output GeoTIFF file
    pub output: String,

    /// the CHUK grid reference file
    #[clap(short, long, env = "CHUK_GRID_PATH")]
    pub grid: String,
}

#[derive(Debug, Args)]
pub struct SampleCommand {
    /// the input CHUK NetCDF4 file
    pub input: String,

    /// the output (sampled) NetCDF4 file
    pub output: String,

    /// resolution in metres of the sampled file, a multiple of the input resolution
    pub resolution: u32,
}

#[derive(Debug, Args)]
pub struct MaskCommand {
    /// the auxiliary NetCDF4 or GeoTIFF file
    pub aux: String,

    /// the categorical variable in the auxiliary file
    pub variable: String,

    /// category names or glob patterns to include, eg '*woodland'
    #[clap(required = true)]
    pub values: Vec<String>,

    /// also include cells with no value
    #[clap(long)]
    pub include_missing: bool,

    /// save the mask to this NetCDF4 file
    #[clap(short, long, requires = "grid")]
    pub output: Option<String>,

    /// the CHUK grid reference file, needed with --output
    #[clap(short, long, env = "CHUK_GRID_PATH")]
    pub grid: Option<String>,
}
