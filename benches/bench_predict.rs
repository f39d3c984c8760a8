//! Prediction engine benchmarks.
//!
//! Benchmarks the three layers independently:
//! 1. Context merging (the closure hot path)
//! 2. Parser prediction, cold (DFA rebuilt every pass) vs. warm (cached)
//! 3. Lexer tokenization throughput

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use llstar::atn::{Atn, StateKind, Transition};
use llstar::context::{ContextCache, EMPTY_CONTEXT};
use llstar::lexer::LexerAtnSimulator;
use llstar::parser::ParserAtnSimulator;
use llstar::stream::{IntStream, StrCharStream, VecTokenStream};
use llstar::{DecisionId, LexerHost, NullListener, Recognizer, RuleId, StateId, EOF, NO_STATE};

const ID: i32 = 1;
const COMMA: i32 = 2;

struct BenchRecognizer;

impl Recognizer for BenchRecognizer {
    fn sempred(&mut self, _rule: RuleId, _pred: u32) -> bool {
        true
    }
    fn precpred(&mut self, _precedence: i32) -> bool {
        true
    }
}

struct BenchHost;

impl LexerHost for BenchHost {
    fn sempred(&mut self, _rule: RuleId, _pred: u32) -> bool {
        true
    }
    fn skip(&mut self) {}
    fn more(&mut self) {}
    fn set_type(&mut self, _t: i32) {}
    fn set_channel(&mut self, _c: i32) {}
    fn set_mode(&mut self, _m: usize) {}
    fn push_mode(&mut self, _m: usize) {}
    fn pop_mode(&mut self) {}
    fn action(&mut self, _rule: RuleId, _action: u32) {}
}

fn epsilon(atn: &mut Atn, from: StateId, to: StateId) {
    atn.add_transition(from, Transition::Epsilon { target: to, outermost_precedence_return: None });
}

fn atom(atn: &mut Atn, from: StateId, to: StateId, label: i32) {
    atn.add_transition(from, Transition::Atom { target: to, label });
}

/// `s : ID | ID ',' ID ;` — resolved by the second lookahead token.
fn list_grammar() -> (Atn, DecisionId) {
    let mut atn = Atn::new(COMMA);
    let start = atn
        .add_state(StateKind::RuleStart { stop_state: NO_STATE, is_left_recursive: false }, 0);
    let stop = atn.add_state(StateKind::RuleStop, 0);
    let d = atn.add_state(StateKind::Basic, 0);
    let a1 = atn.add_state(StateKind::Basic, 0);
    let a2 = atn.add_state(StateKind::Basic, 0);
    let b1 = atn.add_state(StateKind::Basic, 0);
    let b2 = atn.add_state(StateKind::Basic, 0);
    let b3 = atn.add_state(StateKind::Basic, 0);
    let b4 = atn.add_state(StateKind::Basic, 0);
    let end = atn.add_state(StateKind::BlockEnd { start_state: d }, 0);

    epsilon(&mut atn, start, d);
    epsilon(&mut atn, d, a1);
    epsilon(&mut atn, d, b1);
    atom(&mut atn, a1, a2, ID);
    epsilon(&mut atn, a2, end);
    atom(&mut atn, b1, b2, ID);
    atom(&mut atn, b2, b3, COMMA);
    atom(&mut atn, b3, b4, ID);
    epsilon(&mut atn, b4, end);
    epsilon(&mut atn, end, stop);

    let decision = atn.register_decision(d);
    (atn, decision)
}

/// `IDENT : [a-z]+ ;  WS : ' ' ;`
fn word_lexer() -> Atn {
    let mut atn = Atn::new(2);
    let r0 = atn
        .add_state(StateKind::RuleStart { stop_state: NO_STATE, is_left_recursive: false }, 0);
    let d1 = atn.add_state(StateKind::Basic, 0);
    let stop0 = atn.add_state(StateKind::RuleStop, 0);
    atn.add_transition(r0, Transition::Range { target: d1, lo: 'a' as i32, hi: 'z' as i32 });
    atn.add_transition(d1, Transition::Range { target: d1, lo: 'a' as i32, hi: 'z' as i32 });
    epsilon(&mut atn, d1, stop0);

    let r1 = atn
        .add_state(StateKind::RuleStart { stop_state: NO_STATE, is_left_recursive: false }, 1);
    let w1 = atn.add_state(StateKind::Basic, 1);
    let stop1 = atn.add_state(StateKind::RuleStop, 1);
    atom(&mut atn, r1, w1, ' ' as i32);
    epsilon(&mut atn, w1, stop1);

    let tokens = atn.add_state(StateKind::TokensStart, 0);
    epsilon(&mut atn, tokens, r0);
    epsilon(&mut atn, tokens, r1);
    atn.add_mode(tokens);
    atn.set_rule_token_type(0, 1);
    atn.set_rule_token_type(1, 2);
    atn
}

fn bench_context_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("context/merge");
    group.warm_up_time(Duration::from_secs(3));
    group.measurement_time(Duration::from_secs(5));
    group.sample_size(200);

    for depth in [2usize, 8, 32] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter(|| {
                let mut cache = ContextCache::new();
                let mut acc = EMPTY_CONTEXT;
                for i in 0..depth as u32 {
                    let mut chain = EMPTY_CONTEXT;
                    for j in 0..depth as u32 {
                        chain = cache.singleton(chain, i * 31 + j);
                    }
                    acc = cache.merge(acc, chain, false);
                }
                acc
            });
        });
    }

    group.finish();
}

fn bench_parser_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser/adaptive_predict");
    group.warm_up_time(Duration::from_secs(3));
    group.measurement_time(Duration::from_secs(5));
    group.sample_size(200);

    let (atn, decision) = list_grammar();
    let tokens = vec![ID, COMMA, ID, EOF];

    group.bench_function("cold", |b| {
        let mut sim = ParserAtnSimulator::new(&atn);
        let mut recog = BenchRecognizer;
        b.iter(|| {
            sim.clear_dfa(decision);
            let mut input = VecTokenStream::new(tokens.clone());
            sim.adaptive_predict(&mut input, &mut recog, &mut NullListener, decision, None)
                .unwrap()
        });
    });

    group.bench_function("warm", |b| {
        let mut sim = ParserAtnSimulator::new(&atn);
        let mut recog = BenchRecognizer;
        let mut input = VecTokenStream::new(tokens.clone());
        sim.adaptive_predict(&mut input, &mut recog, &mut NullListener, decision, None)
            .unwrap();
        b.iter(|| {
            input.seek(0);
            sim.adaptive_predict(&mut input, &mut recog, &mut NullListener, decision, None)
                .unwrap()
        });
    });

    group.finish();
}

fn bench_lexer_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer/tokenize");
    group.warm_up_time(Duration::from_secs(3));
    group.measurement_time(Duration::from_secs(5));
    group.sample_size(200);

    let atn = word_lexer();
    for words in [10usize, 100, 1000] {
        let text = vec!["lorem"; words].join(" ");
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(words), &text, |b, text| {
            let mut sim = LexerAtnSimulator::new(&atn);
            let mut host = BenchHost;
            b.iter(|| {
                let mut input = StrCharStream::new(text);
                let mut n = 0u32;
                loop {
                    let tok = sim.match_token(&mut input, &mut host, 0).unwrap();
                    if tok == EOF {
                        break;
                    }
                    n += 1;
                }
                n
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_context_merge, bench_parser_predict, bench_lexer_throughput);
criterion_main!(benches);
