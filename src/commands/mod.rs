//! Commands shipped with the `artisan` binary.

pub mod concurrently;
pub mod exec;

use crate::config::ConsoleConfig;
use crate::console::Application;
use crate::process::Factory;

/// The `artisan` application with every bundled command registered.
#[must_use]
pub fn application(factory: Factory, config: ConsoleConfig) -> Application {
    let mut app = Application::new("artisan", env!("CARGO_PKG_VERSION"))
        .with_factory(factory)
        .with_config(config);
    app.add(exec::ExecCommand).add(concurrently::ConcurrentlyCommand);
    app
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_bundled_commands() {
        let app = application(Factory::new(), ConsoleConfig::default());
        let names: Vec<&str> = app.all().map(|command| command.name()).collect();
        assert_eq!(names, vec!["concurrently", "exec", "list"]);
        assert_eq!(app.name(), "artisan");
    }
}
