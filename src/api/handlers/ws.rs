// src/api/handlers/ws.rs
use actix::{Actor, StreamHandler, Handler, Message, Addr, AsyncContext};
use actix_web::{web, HttpRequest, HttpResponse, Error};
use actix_web_actors::ws;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::host::Verdict;

/// Pushed to every connected client when a run becomes the current verdict.
#[derive(Message, Clone, Serialize, Debug, PartialEq)]
#[rtype(result = "()")]
pub struct VerdictUpdate {
    pub request_id: u64,
    pub status: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

impl From<&Verdict> for VerdictUpdate {
    fn from(verdict: &Verdict) -> Self {
        Self {
            request_id: verdict.request_id,
            status: verdict.status().to_string(),
            total: verdict.summary.total,
            passed: verdict.summary.passed,
            failed: verdict.summary.failed,
        }
    }
}

#[derive(Clone, Default)]
pub struct WsBroker {
    clients: Arc<RwLock<Vec<Addr<WsConnection>>>>,
}

impl WsBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, addr: Addr<WsConnection>) {
        let mut clients = self.clients.write().await;
        clients.push(addr);
    }

    pub async fn unregister(&self, addr: &Addr<WsConnection>) {
        let mut clients = self.clients.write().await;
        clients.retain(|c| c != addr);
    }

    pub async fn broadcast(&self, msg: VerdictUpdate) {
        let clients = self.clients.read().await;
        log::debug!("Broadcasting run #{} to {} client(s)", msg.request_id, clients.len());
        for client in clients.iter() {
            client.do_send(msg.clone());
        }
    }
}

pub struct WsConnection {
    broker: WsBroker,
}

impl WsConnection {
    pub fn new(broker: WsBroker) -> Self {
        Self { broker }
    }
}

impl Actor for WsConnection {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let addr = ctx.address();
        let broker = self.broker.clone();
        actix::spawn(async move {
            broker.register(addr).await;
        });
    }

    fn stopped(&mut self, ctx: &mut Self::Context) {
        let addr = ctx.address();
        let broker = self.broker.clone();
        actix::spawn(async move {
            broker.unregister(&addr).await;
        });
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsConnection {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Close(reason)) => ctx.close(reason),
            _ => (),
        }
    }
}

impl Handler<VerdictUpdate> for WsConnection {
    type Result = ();

    fn handle(&mut self, msg: VerdictUpdate, ctx: &mut Self::Context) {
        if let Ok(json) = serde_json::to_string(&msg) {
            ctx.text(json);
        }
    }
}

pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    broker: web::Data<WsBroker>,
) -> Result<HttpResponse, Error> {
    let conn = WsConnection::new(broker.get_ref().clone());
    ws::start(conn, &req, stream)
}
