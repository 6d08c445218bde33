use criterion::{Criterion, black_box, criterion_group, criterion_main};
use dynexpr::factory;
use dynexpr::{BinderOptions, EvalContext, Expr, Object, Type, Variable, reduce_all, run};

fn counter() -> Variable {
    Variable::new("counter", Type::Object)
}

fn add_assign_on_member(counter: &Variable) -> Expr {
    let member = factory::get_member(Expr::from(counter), "Count", BinderOptions::new()).unwrap();
    factory::add_assign(member, Expr::constant(1), BinderOptions::new()).unwrap()
}

/// `a + 1 + 1 + ...` nested `depth` deep, as the index of a postfix increment.
fn nested_index_increment(depth: usize) -> Expr {
    let a = Variable::new("a", Type::Object);
    let mut key = Expr::from(&a);
    for _ in 0..depth {
        key = factory::add(key, Expr::constant(1), BinderOptions::new()).unwrap();
    }
    let list = Expr::from(Variable::new("list", Type::Object));
    let element = factory::get_index(list, [key], BinderOptions::new()).unwrap();
    factory::post_increment_assign(element, BinderOptions::new()).unwrap()
}

fn bench_reduce_compound(c: &mut Criterion) {
    let expr = add_assign_on_member(&counter());

    c.bench_function("reduce_add_assign_member", |b| {
        b.iter(|| black_box(&expr).reduce())
    });
}

fn bench_reduce_all_nested(c: &mut Criterion) {
    let expr = nested_index_increment(32);

    c.bench_function("reduce_all_nested_index", |b| {
        b.iter(|| reduce_all(black_box(&expr)))
    });
}

fn bench_run_compound(c: &mut Criterion) {
    let counter = counter();
    let expr = add_assign_on_member(&counter);
    let mut ctx = EvalContext::default()
        .with_variable(&counter, Object::new("Counter").with_field("Count", 0));

    c.bench_function("run_add_assign_member", |b| {
        b.iter(|| {
            ctx.runtime_mut().clear_trace();
            let _ = run(black_box(&expr), &mut ctx).unwrap();
        })
    });
}

criterion_group!(
    lowering,
    bench_reduce_compound,
    bench_reduce_all_nested,
    bench_run_compound
);
criterion_main!(lowering);
