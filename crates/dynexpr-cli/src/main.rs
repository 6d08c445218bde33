//! dynexpr CLI
//!
//! Builds a canned dynamic expression, prints it, and optionally prints
//! the lowered tree and runs it against the basic runtime.

use clap::{Parser, ValueEnum};
use dynexpr::factory;
use dynexpr::{
    BinderOptions, BuildError, EvalContext, Expr, NativeFunction, Object, Type, Value, Variable,
    pretty, reduce_all, run,
};

#[derive(Parser)]
#[command(name = "dynexpr")]
#[command(about = "Lower dynamically-bound expressions and run them")]
#[command(after_help = "\
EXAMPLES:
    # Show counter.Count += 5
    dynexpr add-assign

    # Show the lowered tree and run it (Count goes 10 -> 15)
    dynexpr add-assign --reduced --run

    # Watch each binder call as it happens
    RUST_LOG=dynexpr=debug dynexpr post-increment --run
")]
struct Args {
    /// Which expression to build
    #[arg(value_enum)]
    scenario: Scenario,

    /// Also print the fully lowered tree
    #[arg(long)]
    reduced: bool,

    /// Evaluate the expression and print the result and binder trace
    #[arg(long)]
    run: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Scenario {
    /// counter.Count += 5
    AddAssign,
    /// ++counter.Count
    PreIncrement,
    /// counter.Count++
    PostIncrement,
    /// settings.Name ??= "default"
    CoalesceAssign,
    /// button.Click += handler
    EventAdd,
    /// flag && counter.Enabled
    AndAlso,
}

/// A built scenario: the expression plus the context it runs in.
struct Setup {
    expr: Expr,
    ctx: EvalContext,
    /// Object whose state is printed after running
    subject: Variable,
}

fn object_var(name: &str) -> Variable {
    Variable::new(name, Type::Object)
}

fn counter_setup(build: impl FnOnce(Expr) -> Result<Expr, BuildError>) -> anyhow::Result<Setup> {
    let counter = object_var("counter");
    let count = factory::get_member(Expr::from(&counter), "Count", BinderOptions::new())?;
    let ctx = EvalContext::default()
        .with_variable(&counter, Object::new("Counter").with_field("Count", 10));
    Ok(Setup {
        expr: build(count)?,
        ctx,
        subject: counter,
    })
}

fn build(scenario: Scenario) -> anyhow::Result<Setup> {
    let opts = BinderOptions::new;
    match scenario {
        Scenario::AddAssign => {
            counter_setup(|count| factory::add_assign(count, Expr::constant(5), opts()))
        }
        Scenario::PreIncrement => {
            counter_setup(|count| factory::pre_increment_assign(count, opts()))
        }
        Scenario::PostIncrement => {
            counter_setup(|count| factory::post_increment_assign(count, opts()))
        }
        Scenario::CoalesceAssign => {
            let settings = object_var("settings");
            let name = factory::get_member(Expr::from(&settings), "Name", opts())?;
            let expr = factory::null_coalescing_assign(name, Expr::constant("default"), opts())?;
            let ctx = EvalContext::default().with_variable(
                &settings,
                Object::new("Settings").with_field("Name", Value::Null),
            );
            Ok(Setup {
                expr,
                ctx,
                subject: settings,
            })
        }
        Scenario::EventAdd => {
            let button = object_var("button");
            let handler = NativeFunction::new("on_click", |_| Ok(Value::Null));
            let click = factory::get_member(Expr::from(&button), "Click", opts())?;
            let expr = factory::add_assign(click, Expr::constant(handler), opts())?;
            let ctx = EvalContext::default()
                .with_variable(&button, Object::new("Button").with_event("Click"));
            Ok(Setup {
                expr,
                ctx,
                subject: button,
            })
        }
        Scenario::AndAlso => {
            let flag = object_var("flag");
            let counter = object_var("counter");
            let count = factory::get_member(Expr::from(&counter), "Enabled", opts())?;
            let expr = factory::and_also(&flag, count, opts())?;
            let ctx = EvalContext::default()
                .with_variable(&flag, true)
                .with_variable(&counter, Object::new("Counter").with_field("Enabled", false));
            Ok(Setup {
                expr,
                ctx,
                subject: counter,
            })
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let Setup {
        expr,
        mut ctx,
        subject,
    } = build(args.scenario)?;

    println!("{expr}");

    if args.reduced {
        let lowered = reduce_all(&expr);
        println!();
        println!("{}", pretty(&lowered));
    }

    if args.run {
        let result = run(&expr, &mut ctx)?;
        println!();
        println!("result: {result}");
        if let Some(state) = ctx.variable(&subject) {
            println!("{}: {state}", subject.name());
        }
        log::info!("{} binder call(s)", ctx.runtime().trace().len());
        for operation in ctx.runtime().trace() {
            println!("  {operation}");
        }
    }

    Ok(())
}
