//! Subcommand implementations. Each function maps one [`Commands`] variant
//! onto the library pieces: [`corral::project`] for config, [`corral::resolver`]
//! to solve, [`corral::lockfile`] to persist the result, and
//! [`corral::installer`] to fetch the resolved artifacts.

use std::path::Path;
use std::sync::Arc;

use color_eyre::eyre::{eyre, Result, WrapErr};
use tokio::sync::Mutex;

use corral::installer::{self, InstallTask};
use corral::lockfile::Lockfile;
use corral::project::Project;
use corral::provider::Provider;
use corral::registry::RegistryProvider;
use corral::resolver::Resolver;
use corral::spec::Requirement;
use corral::ui::{NullUi, TerminalUi, Ui};

use crate::cli::{
    Cli, Commands, GetArgs, InfoArgs, InitArgs, InstallArgs, LintArgs, ListArgs, OutdatedArgs,
    OutputFormat, UpdateArgs,
};

const LOCKFILE_NAME: &str = "corral.lock";

pub fn execute(cli: Cli) -> Result<()> {
    let format = cli.format;
    match cli.command {
        Commands::Init(args) => init(args),
        Commands::Install(args) => install(args, cli.debug),
        Commands::Update(args) => update(args, cli.debug),
        Commands::Outdated(args) => outdated(args),
        Commands::Lint(args) => lint(args),
        Commands::List(args) => list(args, format),
        Commands::Get(args) => get(args, format),
        Commands::Info(args) => info(args, format),
    }
}

fn init(args: InitArgs) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let path = cwd.join("project.toml");
    if path.exists() {
        return Err(eyre!("{} already exists", path.display()));
    }

    let name = args.name.unwrap_or_else(|| {
        cwd.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string())
    });

    let project = Project::new(&path, &name);
    project.save().wrap_err("failed to write project.toml")?;
    println!("Created {} for project \"{name}\"", path.display());
    Ok(())
}

fn load_project() -> Result<Project> {
    Project::discover(std::env::current_dir()?)
        .wrap_err("no project.toml found in this directory or any parent")
}

fn ui_for(debug: bool) -> Box<dyn Ui> {
    let is_tty = console::Term::stderr().is_term();
    Box::new(TerminalUi::new(is_tty, debug))
}

fn install(args: InstallArgs, debug: bool) -> Result<()> {
    let project = load_project()?;
    let requirements = project.requirements()?;
    let lock_path = project.root().join(LOCKFILE_NAME);

    let existing = Lockfile::load_from_path(&lock_path).ok();

    if args.offline && existing.is_none() {
        return Err(eyre!("--offline requires an existing {LOCKFILE_NAME}"));
    }

    // Offline installs trust the existing lockfile outright: no
    // RegistryProvider is constructed and no HTTP lookup happens.
    let lockfile = if args.offline {
        existing.expect("checked above")
    } else {
        let locked = existing.as_ref().map(Lockfile::pins).unwrap_or_default();
        let graph = {
            let provider = RegistryProvider::new(args.registry.as_str());
            let mut resolver = Resolver::new(provider).with_ui(ui_for(debug));
            resolver
                .resolve(requirements.clone(), &locked)
                .map_err(|e| eyre!(e.to_string()))
                .wrap_err("dependency resolution failed")?
        };
        let lockfile = Lockfile::from_graph(requirements, &graph);
        lockfile
            .save_to_path(&lock_path)
            .wrap_err("failed to write lockfile")?;
        lockfile
    };

    download_locked(&lockfile, &args.registry, &args.target, debug)?;

    println!("Installed {} packages into {}", lockfile.packages.len(), args.target.display());
    Ok(())
}

fn update(args: UpdateArgs, debug: bool) -> Result<()> {
    let project = load_project()?;
    let requirements = project.requirements()?;
    let lock_path = project.root().join(LOCKFILE_NAME);

    let locked = if args.packages.is_empty() {
        Default::default()
    } else {
        let existing = Lockfile::load_from_path(&lock_path).ok();
        let mut pins = existing.as_ref().map(Lockfile::pins).unwrap_or_default();
        for name in &args.packages {
            pins.remove(name);
        }
        pins
    };

    let provider = RegistryProvider::new(args.registry.as_str());
    let mut resolver = Resolver::new(provider).with_ui(ui_for(debug));
    let graph = resolver
        .resolve(requirements.clone(), &locked)
        .map_err(|e| eyre!(e.to_string()))
        .wrap_err("dependency resolution failed")?;

    let lockfile = Lockfile::from_graph(requirements, &graph);
    lockfile
        .save_to_path(&lock_path)
        .wrap_err("failed to write lockfile")?;

    println!("Updated {LOCKFILE_NAME} ({} packages)", lockfile.packages.len());
    Ok(())
}

fn outdated(args: OutdatedArgs) -> Result<()> {
    let project = load_project()?;
    let lock_path = project.root().join(LOCKFILE_NAME);
    let lockfile = Lockfile::load_from_path(&lock_path).wrap_err("no lockfile to check")?;

    let provider = RegistryProvider::new(args.registry.as_str());
    let mut any = false;
    for pkg in &lockfile.packages {
        let requirement = Requirement::parse(&format!("{} *", pkg.name))
            .expect("wildcard requirement always parses");
        let candidates = provider.search_for(&requirement).unwrap_or_default();
        if let Some(latest) = candidates.iter().map(|s| &s.version).max() {
            if *latest > pkg.version {
                println!("{}: {} -> {latest}", pkg.name, pkg.version);
                any = true;
            }
        }
    }
    if !any {
        println!("Everything is up to date.");
    }
    Ok(())
}

fn lint(_args: LintArgs) -> Result<()> {
    let project = load_project()?;
    let requirements = project.requirements()?;
    let lock_path = project.root().join(LOCKFILE_NAME);
    let lockfile = Lockfile::load_from_path(&lock_path).wrap_err("no lockfile to lint")?;

    let mut problems = Vec::new();
    for requirement in &requirements {
        match lockfile.find(requirement.name()) {
            Some(pkg) if requirement.is_satisfied_by(&pkg.version) => {}
            Some(pkg) => problems.push(format!(
                "{} is locked at {} which does not satisfy {requirement}",
                pkg.name, pkg.version
            )),
            None => problems.push(format!("{} has no locked package", requirement.name())),
        }
    }

    if problems.is_empty() {
        println!("project.toml and {LOCKFILE_NAME} agree.");
        Ok(())
    } else {
        for problem in &problems {
            eprintln!("error: {problem}");
        }
        Err(eyre!("{} problem(s) found", problems.len()))
    }
}

fn list(args: ListArgs, format: OutputFormat) -> Result<()> {
    let project = load_project()?;
    let lock_path = project.root().join(LOCKFILE_NAME);
    let lockfile = Lockfile::load_from_path(&lock_path).wrap_err("no lockfile to list")?;

    match format {
        OutputFormat::Text => {
            for pkg in &lockfile.packages {
                println!("{} {}", pkg.name, pkg.version);
                if args.tree {
                    for dep in &pkg.dependencies {
                        println!("  - {dep}");
                    }
                }
            }
        }
        OutputFormat::Json => {
            let packages: Vec<_> = lockfile
                .packages
                .iter()
                .map(|pkg| {
                    serde_json::json!({
                        "name": pkg.name,
                        "version": pkg.version.to_string(),
                        "dependencies": pkg.dependencies.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&packages)?);
        }
    }
    Ok(())
}

fn get(args: GetArgs, format: OutputFormat) -> Result<()> {
    let project = load_project()?;
    let lock_path = project.root().join(LOCKFILE_NAME);
    let lockfile = Lockfile::load_from_path(&lock_path).wrap_err("no lockfile to query")?;

    let pkg = lockfile
        .find(&args.package)
        .ok_or_else(|| eyre!("{} is not locked", args.package))?;
    match format {
        OutputFormat::Text => println!("{} {} ({:?})", pkg.name, pkg.version, pkg.source),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "name": pkg.name,
                "version": pkg.version.to_string(),
                "source": format!("{:?}", pkg.source),
            }))?
        ),
    }
    Ok(())
}

fn info(_args: InfoArgs, format: OutputFormat) -> Result<()> {
    let project = load_project()?;
    let metadata = project.metadata();
    let requirement_count = project.requirements()?.len();
    let lock_path = project.root().join(LOCKFILE_NAME);
    let locked_count = Lockfile::load_from_path(&lock_path).ok().map(|l| l.packages.len());

    match format {
        OutputFormat::Text => {
            println!("name: {}", metadata.name.as_deref().unwrap_or("(unnamed)"));
            println!("version: {}", metadata.version.as_deref().unwrap_or("0.0.0"));
            if let Some(description) = &metadata.description {
                println!("description: {description}");
            }
            println!("requirements: {requirement_count}");
            match locked_count {
                Some(count) => println!("locked packages: {count}"),
                None => println!("locked packages: (no lockfile)"),
            }
        }
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "name": metadata.name,
                "version": metadata.version,
                "description": metadata.description,
                "requirements": requirement_count,
                "locked_packages": locked_count,
            }))?
        ),
    }
    Ok(())
}

fn download_locked(lockfile: &Lockfile, registry: &str, target: &Path, _debug: bool) -> Result<()> {
    let tasks: Vec<InstallTask> = lockfile
        .packages
        .iter()
        .map(|pkg| InstallTask {
            name: pkg.name.clone(),
            url: format!(
                "{}/packages/{}/{}/download",
                registry.trim_end_matches('/'),
                pkg.name,
                pkg.version
            ),
            destination: target.join(format!("{}-{}", pkg.name, pkg.version)),
        })
        .collect();

    let runtime = tokio::runtime::Runtime::new().wrap_err("failed to start installer runtime")?;
    let ui: Arc<Mutex<dyn Ui + Send>> = Arc::new(Mutex::new(NullUi));
    runtime
        .block_on(installer::install_all(tasks, reqwest::Client::new(), ui))
        .map_err(|e| eyre!(e.to_string()))
        .wrap_err("installation failed")
}
