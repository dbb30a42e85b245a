//! End-to-end session behavior against the scripted server.

mod fixtures;

use fixtures::{request_expr, MockServer, ServerReply};
use qmodel::prelude::*;
use qmodel::{QError, Table};

qmodel::model! {
    /// Executed trades.
    pub struct Trade: "trade" {
        sym: Symbol,
        price: Float,
        size: Long,
    }
}

fn trade_fixture() -> Value {
    Value::Table(Table::new(vec![
        (
            "sym".into(),
            Value::Vector(Vector::symbols(vec!["AAPL".into(), "GOOG".into()])),
        ),
        (
            "price".into(),
            Value::Vector(Vector::floats(vec![150.25, 2800.0])),
        ),
    ]))
}

#[test]
fn handshake_and_arithmetic_roundtrip() {
    let server = MockServer::spawn(|request| match request_expr(request) {
        "2+3" => ServerReply::Value(Value::Long(5)),
        _ => ServerReply::Error("nyi".into()),
    });

    let mut session = server.engine().session().expect("open session");
    assert_eq!(session.connection().capability(), 6);

    let result = session.raw("2+3", &[]).expect("query");
    assert_eq!(result.into_value(), Some(Value::Long(5)));
}

#[test]
fn create_table_sends_the_ddl_string() {
    let server = MockServer::spawn(|_| ServerReply::Value(Value::Bool(true)));

    let mut session = server.engine().session().expect("open session");
    session.create_table::<Trade>().expect("create table");

    let expressions = server.expressions();
    assert_eq!(
        expressions,
        vec!["trade:([] sym:`s$(); price:`f$(); size:`j$())".to_string()]
    );
}

#[test]
fn table_reply_iterates_as_rows() {
    let server = MockServer::spawn(|_| ServerReply::Value(trade_fixture()));

    let mut session = server.engine().session().expect("open session");
    let rows = session
        .raw("select from trade", &[])
        .expect("query")
        .rows()
        .expect("table result");

    assert_eq!(rows.len(), 2);
    let all: Vec<_> = rows.iter().collect();
    assert_eq!(all[0].get("sym"), Some(Value::Symbol("AAPL".into())));
    assert_eq!(all[0].get("price"), Some(Value::Float(150.25)));
    assert_eq!(all[1].get("sym"), Some(Value::Symbol("GOOG".into())));
    assert_eq!(all[1].get("price"), Some(Value::Float(2800.0)));
}

#[test]
fn exec_binds_rows_to_the_model() {
    let server = MockServer::spawn(|_| {
        ServerReply::Value(Value::Table(Table::new(vec![
            (
                "sym".into(),
                Value::Vector(Vector::symbols(vec!["AAPL".into()])),
            ),
            (
                "price".into(),
                Value::Vector(Vector::floats(vec![150.25])),
            ),
            ("size".into(), Value::Vector(Vector::longs(vec![100]))),
        ])))
    });

    let mut session = server.engine().session().expect("open session");
    let query = Trade::select().filter(Trade::price().gt(100i64));
    let rows = session.exec(&query).expect("exec").rows().expect("rows");

    let trade = Trade::from_row(&rows.row(0).expect("row")).expect("bind");
    assert_eq!(
        trade,
        Trade {
            sym: "AAPL".into(),
            price: 150.25,
            size: 100
        }
    );
}

#[test]
fn server_errors_surface_as_qerror() {
    let server = MockServer::spawn(|_| ServerReply::Error("type".into()));

    let mut session = server.engine().session().expect("open session");
    let err = session.raw("1+`a", &[]).unwrap_err();
    match err {
        Error::Q(QError { message }) => assert_eq!(message, "type"),
        other => panic!("expected q error, got {other:?}"),
    }
}

#[test]
fn call_sends_the_call_form() {
    let server = MockServer::spawn(|request| match request {
        Value::List(items) if items.len() == 3 => ServerReply::Value(Value::Long(2)),
        _ => ServerReply::Error("rank".into()),
    });

    let mut session = server.engine().session().expect("open session");
    let result = session
        .call("f", &[Value::Long(1), Value::symbol("x")])
        .expect("call");
    assert_eq!(result.into_value(), Some(Value::Long(2)));
}

#[test]
fn tables_and_reflection() {
    let server = MockServer::spawn(|request| match request_expr(request) {
        "tables[]" => ServerReply::Value(Value::Vector(Vector::symbols(vec!["trade".into()]))),
        "meta trade" => {
            let keys = Table::new(vec![(
                "c".into(),
                Value::Vector(Vector::symbols(vec![
                    "sym".into(),
                    "price".into(),
                    "size".into(),
                ])),
            )]);
            let values = Table::new(vec![("t".into(), Value::String("sfj".into()))]);
            ServerReply::Value(Value::Dict(Box::new(qmodel::core::Dict::new(
                Value::Table(keys),
                Value::Table(values),
            ))))
        }
        "keys trade" => ServerReply::Value(Value::Vector(Vector::symbols(vec!["sym".into()]))),
        _ => ServerReply::Error("nyi".into()),
    });

    let mut session = server.engine().session().expect("open session");
    assert_eq!(session.tables().expect("tables"), vec!["trade".to_string()]);

    let descriptor = session.reflect("trade").expect("reflect");
    assert_eq!(descriptor.name, "trade");
    assert_eq!(descriptor.column_names(), vec!["sym", "price", "size"]);
    assert_eq!(descriptor.key_fields(), vec!["sym"]);

    // The reflected descriptor lands in the global registry.
    assert!(qmodel::core::registry::get("trade").is_some());
}

#[test]
fn rejected_handshake_is_an_authentication_error() {
    let server = MockServer::spawn_rejecting();
    let err = server.engine().session().unwrap_err();
    match err {
        Error::Connection(e) => {
            assert_eq!(e.kind, qmodel::core::ConnectionErrorKind::Authentication)
        }
        other => panic!("expected authentication error, got {other:?}"),
    }
}

#[test]
fn namespaces_and_functions_listing() {
    let server = MockServer::spawn(|request| match request_expr(request) {
        "key `" => ServerReply::Value(Value::Vector(Vector::symbols(vec![
            "q".into(),
            "Q".into(),
            "u".into(),
        ]))),
        "system \"f\"" => {
            ServerReply::Value(Value::Vector(Vector::symbols(vec!["upd".into()])))
        }
        _ => ServerReply::Error("nyi".into()),
    });

    let mut session = server.engine().session().expect("open session");
    assert_eq!(session.namespaces().expect("namespaces").len(), 3);
    assert_eq!(session.functions(None).expect("functions"), vec!["upd"]);
}
