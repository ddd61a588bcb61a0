pub mod cat;
pub mod cmp;
pub mod config;
pub mod cuefile;
pub mod error;
pub mod fileio;
pub mod fix;
pub mod gen;
pub mod hash;
pub mod header;
pub mod join;
pub mod length;
pub mod pad;
pub mod report;
pub mod runner;
pub mod split;
pub mod stream;
pub mod strip;
pub mod trim;
pub mod wave;

#[cfg(test)]
pub(crate) mod testutil;

pub use cat::{cat_file, CatParts};
pub use cmp::{cmp_files, CmpOptions, Comparison};
pub use config::Config;
pub use cuefile::{generate_cue_sheet, generate_split_points, CueInfo, SplitPointReader};
pub use error::{Disposition, Error, Result};
pub use fix::{fix_files, FixOptions, FixReport, FixShift};
pub use gen::generate_silence;
pub use hash::{hash_composite, hash_file, HashAccumulator, HashAlgorithm};
pub use join::{join_files, JoinReport};
pub use length::{length_to_str, parse_length};
pub use pad::{pad_file, PadMode};
pub use report::{info_report, len_line, LenOptions, LenTotals, SizeUnit};
pub use runner::{run_batch, run_each, RunSummary};
pub use split::{split_file, SplitOptions, SplitPoints, SplitReport};
pub use stream::{reorder_files, FileOpener, FileOrder, OutputNaming, StreamOpener};
pub use strip::{strip_file, StripOptions};
pub use trim::{trim_file, TrimEnds};
pub use wave::{Problem, Problems, WaveDescriptor};
