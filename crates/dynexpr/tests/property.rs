use dynexpr::factory;
use dynexpr::{
    BinderOptions, EvalContext, Expr, Object, Type, Value, Variable, contains_dynamic, reduce_all,
    run,
};
use proptest::prelude::*;

/// Reference arithmetic the lowered tree must agree with.
#[derive(Debug, Clone)]
enum Arith {
    A,
    B,
    Lit(i32),
    Add(Box<Arith>, Box<Arith>),
    Sub(Box<Arith>, Box<Arith>),
    Mul(Box<Arith>, Box<Arith>),
}

fn arb_arith(depth: u32) -> BoxedStrategy<Arith> {
    let leaf = prop_oneof![
        Just(Arith::A),
        Just(Arith::B),
        (-1000i32..1000).prop_map(Arith::Lit),
    ];
    if depth == 0 {
        return leaf.boxed();
    }
    let nested = (arb_arith(depth - 1), 0..3u8, arb_arith(depth - 1)).prop_map(|(l, op, r)| {
        let (l, r) = (Box::new(l), Box::new(r));
        match op {
            0 => Arith::Add(l, r),
            1 => Arith::Sub(l, r),
            _ => Arith::Mul(l, r),
        }
    });
    prop_oneof![leaf, nested].boxed()
}

impl Arith {
    fn expected(&self, a: i32, b: i32) -> i32 {
        match self {
            Arith::A => a,
            Arith::B => b,
            Arith::Lit(n) => *n,
            Arith::Add(l, r) => l.expected(a, b).wrapping_add(r.expected(a, b)),
            Arith::Sub(l, r) => l.expected(a, b).wrapping_sub(r.expected(a, b)),
            Arith::Mul(l, r) => l.expected(a, b).wrapping_mul(r.expected(a, b)),
        }
    }

    fn build(&self, a: &Variable, b: &Variable) -> Expr {
        let opts = BinderOptions::new;
        match self {
            Arith::A => Expr::from(a),
            Arith::B => Expr::from(b),
            Arith::Lit(n) => Expr::constant(*n),
            Arith::Add(l, r) => factory::add(l.build(a, b), r.build(a, b), opts()).unwrap(),
            Arith::Sub(l, r) => factory::subtract(l.build(a, b), r.build(a, b), opts()).unwrap(),
            Arith::Mul(l, r) => factory::multiply(l.build(a, b), r.build(a, b), opts()).unwrap(),
        }
    }
}

fn counter_ctx(count: i32) -> (Variable, EvalContext) {
    let counter = Variable::new("counter", Type::Object);
    let ctx = EvalContext::default()
        .with_variable(&counter, Object::new("Counter").with_field("Count", count));
    (counter, ctx)
}

fn count(ctx: &EvalContext, counter: &Variable) -> Value {
    let value = ctx.variable(counter).expect("counter is bound");
    let object = value.as_object().expect("counter is an object");
    object.borrow().fields["Count"].clone()
}

fn count_member(counter: &Variable) -> Expr {
    factory::get_member(Expr::from(counter), "Count", BinderOptions::new()).unwrap()
}

proptest! {
    #[test]
    fn lowered_arithmetic_matches_reference(
        tree in arb_arith(3),
        a in -10_000i32..10_000,
        b in -10_000i32..10_000,
    ) {
        let (va, vb) = (
            Variable::new("a", Type::Object),
            Variable::new("b", Type::Object),
        );
        let expr = tree.build(&va, &vb);
        prop_assert!(!contains_dynamic(&reduce_all(&expr)));

        let mut ctx = EvalContext::default().with_variable(&va, a).with_variable(&vb, b);
        let value = run(&expr, &mut ctx).expect("arithmetic evaluates");
        prop_assert_eq!(value, Value::Int(tree.expected(a, b)));
    }

    #[test]
    fn add_assign_reads_and_writes_once(start in any::<i32>(), delta in any::<i32>()) {
        let (counter, mut ctx) = counter_ctx(start);
        let expr = factory::add_assign(
            count_member(&counter),
            Expr::constant(delta),
            BinderOptions::new(),
        )
        .unwrap();
        let value = run(&expr, &mut ctx).expect("unchecked add never fails");
        prop_assert_eq!(&value, &Value::Int(start.wrapping_add(delta)));
        prop_assert_eq!(count(&ctx, &counter), value);

        let trace = ctx.runtime().trace();
        prop_assert_eq!(trace.iter().filter(|op| op.starts_with("GetMember")).count(), 1);
        prop_assert_eq!(trace.iter().filter(|op| op.starts_with("SetMember")).count(), 1);
    }

    #[test]
    fn checked_add_assign_fails_exactly_on_overflow(start in any::<i32>(), delta in any::<i32>()) {
        let (counter, mut ctx) = counter_ctx(start);
        let expr = factory::add_assign_checked(
            count_member(&counter),
            Expr::constant(delta),
            BinderOptions::new(),
        )
        .unwrap();
        match start.checked_add(delta) {
            Some(sum) => prop_assert_eq!(run(&expr, &mut ctx).ok(), Some(Value::Int(sum))),
            None => {
                prop_assert!(run(&expr, &mut ctx).is_err());
                prop_assert_eq!(count(&ctx, &counter), Value::Int(start));
            }
        }
    }

    #[test]
    fn prefix_and_postfix_agree_on_the_stored_value(start in any::<i32>()) {
        let (counter, mut ctx) = counter_ctx(start);
        let pre =
            factory::pre_increment_assign(count_member(&counter), BinderOptions::new()).unwrap();
        let pre_value = run(&pre, &mut ctx).unwrap();
        prop_assert_eq!(&pre_value, &Value::Int(start.wrapping_add(1)));
        prop_assert_eq!(count(&ctx, &counter), pre_value);

        let (counter, mut ctx) = counter_ctx(start);
        let post =
            factory::post_increment_assign(count_member(&counter), BinderOptions::new()).unwrap();
        prop_assert_eq!(run(&post, &mut ctx).unwrap(), Value::Int(start));
        prop_assert_eq!(count(&ctx, &counter), Value::Int(start.wrapping_add(1)));
    }
}
