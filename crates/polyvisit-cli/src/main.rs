use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

use anyhow::Context;
use polyvisit_core::observability::init_tracing;
use polyvisit_core::{
    CapabilityDecl, ClassDecl, Dispatcher, DispatcherBuilder, DispatcherConfig, Handler,
    HandlerTable, TypeGraph, Visitable,
};

struct Animal {
    name: String,
}

struct Dog {
    animal: Animal,
    tricks: Vec<&'static str>,
}

struct Cat {
    animal: Animal,
}

struct Drone;

/// capability: 名前を持つもの
enum Named {}

impl Visitable for Dog {}
impl Visitable for Cat {}
impl Visitable for Drone {}

fn zoo_graph() -> anyhow::Result<TypeGraph> {
    let graph = TypeGraph::new()
        .with_class(ClassDecl::<Animal>::new().implements::<Named>())?
        .with_class(ClassDecl::<Dog>::new().extends::<Animal>(|dog| &dog.animal))?
        .with_class(ClassDecl::<Cat>::new().extends::<Animal>(|cat| &cat.animal))?
        .with_class(ClassDecl::<Drone>::new().implements::<Named>())?
        .with_capability(CapabilityDecl::<Named>::new())?;
    Ok(graph)
}

/// Describer：値の型ごとに説明を出す handler
struct Describer {
    table: Arc<HandlerTable<Describer>>,
    dispatcher: Dispatcher,
    described: AtomicU32,
}

impl Handler for Describer {
    fn table(&self) -> &Arc<HandlerTable<Self>> {
        &self.table
    }

    fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

/// Describer のテーブルは 1 度だけ作り、全インスタンスで共有する。
/// テーブルを作り直すと別の handler 型扱いになり、キャッシュが共有されない。
static DESCRIBER_TABLE: OnceLock<Arc<HandlerTable<Describer>>> = OnceLock::new();

fn describer_table() -> anyhow::Result<Arc<HandlerTable<Describer>>> {
    if let Some(table) = DESCRIBER_TABLE.get() {
        return Ok(Arc::clone(table));
    }
    let table = HandlerTable::<Describer>::builder("Describer")
        .on::<Dog, _>(|d, dog| {
            d.describe(format!("{} knows {} tricks", dog.animal.name, dog.tricks.len()))
        })?
        .on::<Animal, _>(|d, animal| d.describe(format!("{} is an animal", animal.name)))?
        .on_kind::<Named, _>(|_, value| {
            // 意図的に失敗させる: dispatch は止まらず、ログに原因が残る
            Err(anyhow::anyhow!("no name plate found"))
                .with_context(|| format!("describing {}", value.type_key().short_name()))
        })?
        .otherwise(|d, value| d.describe(format!("unknown {}", value.type_key().short_name())))?
        .build();
    // 競合したら先に入った方を使う
    Ok(Arc::clone(DESCRIBER_TABLE.get_or_init(|| table)))
}

impl Describer {
    fn new(dispatcher: Dispatcher) -> anyhow::Result<Self> {
        Ok(Self {
            table: describer_table()?,
            dispatcher,
            described: AtomicU32::new(0),
        })
    }

    fn describe(&self, line: String) -> anyhow::Result<()> {
        self.described.fetch_add(1, Ordering::Relaxed);
        println!("{line}");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    // (A) 型グラフと dispatcher を用意
    let dispatcher = DispatcherBuilder::new()
        .graph(zoo_graph()?)
        .config(DispatcherConfig::default())
        .build()?;

    // (B) 値のバッチ
    let batch: Vec<Arc<dyn Visitable>> = vec![
        Arc::new(Dog {
            animal: Animal {
                name: "Rex".to_string(),
            },
            tricks: vec!["sit", "roll"],
        }),
        Arc::new(Cat {
            animal: Animal {
                name: "Tom".to_string(),
            },
        }),
        Arc::new(Drone),
    ];

    // (C) 複数タスクから同時に dispatch。インスタンスはタスクごと、テーブルは共有
    let mut workers = Vec::new();
    for worker in 0..4 {
        let describer = Describer::new(dispatcher.clone())?;
        let batch = batch.clone();
        workers.push(tokio::spawn(async move {
            for value in &batch {
                if let Err(err) = value.accept(&describer) {
                    tracing::error!(worker, %err, "dispatch aborted");
                }
            }
            describer.described.load(Ordering::Relaxed)
        }));
    }
    let mut described = 0;
    for worker in workers {
        described += worker.await?;
    }

    // (D) キャッシュの状態を出力（handler 型は 1 つ、binding は値の型ごとに 1 つ）
    println!("described={described}");
    println!("{}", serde_json::to_string_pretty(&dispatcher.stats())?);
    Ok(())
}
