use eyre::EyreHandler;
use itertools::Itertools;
use std::{error::Error, fmt};

/// Renders command failures as the deduplicated cause chain.
#[derive(Default)]
pub struct Handler {
    /// Takes over `{:?}` rendering when `FASTPATH_DEBUG` is set.
    verbose: Option<Box<dyn EyreHandler>>,
}

impl Handler {
    pub fn verbose(handler: Box<dyn EyreHandler>) -> Self {
        Self { verbose: Some(handler) }
    }
}

impl EyreHandler for Handler {
    fn display(&self, error: &(dyn Error + 'static), f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use fmt::Display;
        dedup_chain(error).into_iter().format(": ").fmt(f)
    }

    fn debug(&self, error: &(dyn Error + 'static), f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(verbose) = &self.verbose {
            return verbose.debug(error, f);
        }
        if f.alternate() {
            return fmt::Debug::fmt(error, f);
        }

        let causes = dedup_chain(error);
        let Some((head, rest)) = causes.split_first() else { return Ok(()) };
        write!(f, "{head}")?;
        for cause in rest {
            write!(f, "\n  caused by: {cause}")?;
        }
        Ok(())
    }

    fn track_caller(&mut self, location: &'static std::panic::Location<'static>) {
        if let Some(verbose) = &mut self.verbose {
            verbose.track_caller(location);
        }
    }
}

/// Collects the messages of `error` and its sources, dropping a source whose message is
/// already part of the previous one.
pub fn dedup_chain(error: &(dyn Error + 'static)) -> Vec<String> {
    let mut causes = Vec::new();
    let mut next = Some(error);
    while let Some(cause) = next {
        causes.push(cause.to_string().trim().to_string());
        next = cause.source();
    }
    // `send failed: user rejected` already carries `user rejected`
    causes.dedup_by(|b, a| a.contains(b.as_str()));
    causes
}

/// Installs the process-wide panic and [`eyre`] hooks.
///
/// `FASTPATH_DEBUG` switches error reports to the `color_eyre` backtrace view.
pub fn install() {
    let (panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default()
        .panic_section("This is a bug in fastpath. Please report it with the command you ran.")
        .into_hooks();
    panic_hook.install();

    let eyre_hook = eyre_hook.into_eyre_hook();
    let verbose = std::env::var_os("FASTPATH_DEBUG").is_some();
    let installed = eyre::set_hook(Box::new(move |err| {
        Box::new(if verbose { Handler::verbose(eyre_hook(err)) } else { Handler::default() })
    }));
    if let Err(err) = installed {
        debug!(%err, "eyre hook already installed");
    }
}
