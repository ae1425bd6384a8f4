pub mod config;
pub mod error;
pub mod extractor;
pub mod join;
pub mod parser;
pub mod projection;
pub mod router;
pub mod scanner;
pub mod simulator;

pub use config::SimulatorConfig;
pub use error::{JoinError, Result};
pub use extractor::{JoinSpec, ProjectionSpec, QueryExtractor};
pub use join::{nested_loop_join, JoinedRow};
pub use parser::{Relation, Row, RowParser};
pub use projection::{project, FormattedOutput};
pub use router::{rewrite_script, run_script_file, run_statement, RouteOptions};
pub use scanner::{InMemoryScanner, ProcessScanner, RelationScanner};
pub use simulator::{JoinSimulator, QueryOutcome};
