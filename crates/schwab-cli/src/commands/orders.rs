use schwab_api_wrapper::{
    Instruction, Order, OrderFilter, OrderStatus, OrderType, SchwabClient, Symbol,
};
use serde_json::{json, Value};
use tracing::info;

use crate::cli::{InstructionArg, OrderArgs, OrderCommand, OrderSpec, OrdersArgs};
use crate::error::CliError;

pub async fn list(args: &OrdersArgs, client: &SchwabClient) -> Result<Value, CliError> {
    let mut filter = OrderFilter::last_days(args.days);
    if let Some(max_results) = args.max_results {
        filter = filter.with_max_results(max_results);
    }
    if let Some(status) = &args.status {
        filter = filter.with_status(parse_status(status)?);
    }

    let orders = match &args.account {
        Some(account) => client.orders(account, &filter).await?,
        None => client.all_orders(&filter).await?,
    };
    Ok(serde_json::to_value(orders)?)
}

pub async fn run(args: &OrderArgs, client: &SchwabClient) -> Result<Value, CliError> {
    match &args.command {
        OrderCommand::Get(order) => {
            let order = client.order(&order.account, order.order_id).await?;
            Ok(serde_json::to_value(order)?)
        }
        OrderCommand::Cancel(order) => {
            client.cancel_order(&order.account, order.order_id).await?;
            info!(order_id = order.order_id, "order canceled");
            Ok(json!({ "order_id": order.order_id, "canceled": true }))
        }
        OrderCommand::Place(spec) => {
            let order = build_order(spec)?;
            let order_id = client.place_order(&spec.account, &order).await?;
            info!(order_id, "order placed");
            Ok(json!({ "order_id": order_id }))
        }
        OrderCommand::Preview(spec) => {
            let order = build_order(spec)?;
            let preview = client.preview_order(&spec.account, &order).await?;
            Ok(serde_json::to_value(preview)?)
        }
    }
}

fn parse_status(raw: &str) -> Result<OrderStatus, CliError> {
    let wire = raw.trim().to_ascii_uppercase();
    match serde_json::from_value::<OrderStatus>(Value::String(wire)) {
        Ok(OrderStatus::Unknown) | Err(_) => {
            Err(CliError::Usage(format!("unknown order status '{raw}'")))
        }
        Ok(status) => Ok(status),
    }
}

fn build_order(spec: &OrderSpec) -> Result<Order, CliError> {
    if let Some(path) = &spec.file {
        let body = std::fs::read_to_string(path)?;
        return Ok(serde_json::from_str(&body)?);
    }

    let (Some(symbol), Some(instruction), Some(quantity)) =
        (&spec.symbol, spec.instruction, spec.quantity)
    else {
        return Err(CliError::Usage(String::from(
            "--symbol, --instruction and --quantity are required without --file",
        )));
    };
    let symbol = Symbol::parse(symbol)?;
    let instruction = match instruction {
        InstructionArg::Buy => Instruction::Buy,
        InstructionArg::Sell => Instruction::Sell,
        InstructionArg::SellShort => Instruction::SellShort,
        InstructionArg::BuyToCover => Instruction::BuyToCover,
    };

    let mut order = match spec.limit {
        Some(price) => Order::limit(instruction, symbol, quantity, price),
        None => Order::market(instruction, symbol, quantity),
    };
    if let Some(stop) = spec.stop {
        order.order_type = Some(if spec.limit.is_some() {
            OrderType::StopLimit
        } else {
            OrderType::Stop
        });
        order = order.with_stop_price(stop);
    }
    Ok(order)
}
