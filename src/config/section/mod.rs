//! Configuration section definitions.
//!
//! Each module corresponds to a section in `weft.toml`:
//!
//! | Module      | TOML Section                     | Purpose                              |
//! |-------------|----------------------------------|--------------------------------------|
//! | `build`     | `[build]`                        | Source root, output dir, limits      |
//! | `entry`     | `[[entry]]`                      | Named entry points                   |
//! | `output`    | `[output]`                       | File name templates, manifest name   |
//! | `resolve`   | `[resolve]`                      | Extensions, module dirs, aliases     |
//! | `rule`      | `[[rule]]`                       | Path pattern → transform chain       |
//! | `extract`   | `[extract]`                      | Extracted stylesheet naming          |
//! | `split`     | `[split]`                        | Commons, chunk count/size limits     |
//! | `constants` | `[define]`, `[env]`, `[provide]` | Script constants and auto-imports    |
//! | `html`      | `[html]`                         | Entry document template              |
//! | `serve`     | `[serve]`                        | Development server                   |

mod build;
mod constants;
mod entry;
mod extract;
mod html;
mod output;
mod resolve;
mod rule;
mod serve;
mod split;

pub use build::BuildSection;
pub use constants::EnvSection;
pub use entry::EntryConfig;
pub use extract::ExtractSection;
pub use html::HtmlSection;
pub use output::OutputSection;
pub use resolve::ResolveSection;
pub use rule::RuleConfig;
pub use serve::ServeSection;
pub use split::SplitSection;
