//! SQLite-backed `PersistenceGateway` (spec.md §6 persistence schema).
//!
//! A single `Arc<Mutex<Connection>>` opened with `SQLITE_OPEN_NO_MUTEX` (we
//! do our own locking), WAL mode, and `CREATE TABLE IF NOT EXISTS`
//! schema-on-open.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::domain::{
    Agent, AgentStatus, Alliance, AllianceStatus, Company, CrimeType, Holding, Investigation,
    InvestigationStatus, Message, NewsArticle, Order, OrderStatus, OrderType, Side, Trade,
    TickEventRecord, WorldState,
};

use super::{ActionLogEntry, GatewayError, GatewayResult, PersistenceGateway};

impl From<rusqlite::Error> for GatewayError {
    fn from(e: rusqlite::Error) -> Self {
        GatewayError::Storage(e.to_string())
    }
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap_or(Decimal::ZERO)
}

pub struct SqliteGateway {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteGateway {
    pub fn open(path: impl AsRef<Path>) -> GatewayResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let gateway = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        gateway.init_schema()?;
        Ok(gateway)
    }

    pub fn open_in_memory() -> GatewayResult<Self> {
        let conn = Connection::open_in_memory()?;
        let gateway = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        gateway.init_schema()?;
        Ok(gateway)
    }

    fn init_schema(&self) -> GatewayResult<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS agents (
                id TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                role TEXT NOT NULL,
                status TEXT NOT NULL,
                cash TEXT NOT NULL,
                margin_used TEXT NOT NULL,
                margin_limit TEXT NOT NULL,
                reputation INTEGER NOT NULL,
                alliance_id TEXT,
                webhook_url TEXT,
                webhook_secret TEXT,
                webhook_failures INTEGER NOT NULL,
                last_webhook_error TEXT,
                last_webhook_success_at INTEGER,
                last_response_time_ms INTEGER,
                avg_response_time_ms INTEGER,
                webhook_success_count INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS orders (
                id TEXT PRIMARY KEY,
                agent_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                order_type TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                filled_quantity INTEGER NOT NULL,
                price TEXT,
                status TEXT NOT NULL,
                tick_submitted INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_orders_symbol ON orders(symbol);

            CREATE TABLE IF NOT EXISTS trades (
                id TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                buyer_id TEXT NOT NULL,
                seller_id TEXT NOT NULL,
                buyer_order_id TEXT NOT NULL,
                seller_order_id TEXT NOT NULL,
                price TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                tick INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_trades_symbol ON trades(symbol, tick);

            CREATE TABLE IF NOT EXISTS companies (
                symbol TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                sector TEXT NOT NULL,
                current_price TEXT NOT NULL,
                previous_close TEXT NOT NULL,
                open TEXT NOT NULL,
                high TEXT NOT NULL,
                low TEXT NOT NULL,
                market_cap TEXT NOT NULL,
                shares_outstanding INTEGER NOT NULL,
                volatility TEXT NOT NULL,
                beta TEXT NOT NULL,
                sentiment TEXT NOT NULL,
                is_public INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS holdings (
                agent_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                avg_cost TEXT NOT NULL,
                PRIMARY KEY (agent_id, symbol)
            );

            CREATE TABLE IF NOT EXISTS news (
                id TEXT PRIMARY KEY,
                tick INTEGER NOT NULL,
                headline TEXT NOT NULL,
                content TEXT NOT NULL,
                category TEXT NOT NULL,
                sentiment REAL NOT NULL,
                symbols TEXT NOT NULL,
                agent_ids TEXT NOT NULL,
                is_breaking INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                tick INTEGER NOT NULL,
                sender_id TEXT NOT NULL,
                recipient_id TEXT,
                channel TEXT NOT NULL,
                subject TEXT,
                content TEXT NOT NULL,
                is_read INTEGER NOT NULL,
                is_deleted INTEGER NOT NULL,
                read_at INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_messages_recipient ON messages(recipient_id);

            CREATE TABLE IF NOT EXISTS alliances (
                id TEXT PRIMARY KEY,
                proposer_id TEXT NOT NULL,
                partner_id TEXT NOT NULL,
                status TEXT NOT NULL,
                dissolution_reason TEXT
            );

            CREATE TABLE IF NOT EXISTS investigations (
                id TEXT PRIMARY KEY,
                target_agent_id TEXT NOT NULL,
                crime_type TEXT NOT NULL,
                status TEXT NOT NULL,
                tick_opened INTEGER NOT NULL,
                tick_charged INTEGER,
                fine_amount TEXT,
                sentence_years INTEGER,
                imprisoned_until_tick INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_investigations_target ON investigations(target_agent_id);

            CREATE TABLE IF NOT EXISTS action_log (
                tick INTEGER NOT NULL,
                agent_id TEXT NOT NULL,
                action_type TEXT NOT NULL,
                target_symbol TEXT,
                target_agent_id TEXT,
                payload TEXT NOT NULL,
                result TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tick_events (
                tick INTEGER PRIMARY KEY,
                timestamp INTEGER NOT NULL,
                trades TEXT NOT NULL,
                news TEXT NOT NULL,
                price_updates TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS world_state (
                id INTEGER PRIMARY KEY CHECK (id = 0),
                tick INTEGER NOT NULL,
                market_open INTEGER NOT NULL,
                regime TEXT NOT NULL,
                interest_rate TEXT NOT NULL,
                inflation_rate TEXT NOT NULL,
                gdp_growth TEXT NOT NULL,
                last_tick_at INTEGER NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    fn row_to_agent(row: &Row) -> rusqlite::Result<Agent> {
        Ok(Agent {
            id: row.get(0)?,
            display_name: row.get(1)?,
            role: row.get(2)?,
            status: AgentStatus::from_str(&row.get::<_, String>(3)?).unwrap_or(AgentStatus::Active),
            cash: dec(&row.get::<_, String>(4)?),
            margin_used: dec(&row.get::<_, String>(5)?),
            margin_limit: dec(&row.get::<_, String>(6)?),
            reputation: row.get(7)?,
            alliance_id: row.get(8)?,
            webhook_url: row.get(9)?,
            webhook_secret: row.get(10)?,
            webhook_failures: row.get(11)?,
            last_webhook_error: row.get(12)?,
            last_webhook_success_at: row.get(13)?,
            last_response_time_ms: row.get(14)?,
            avg_response_time_ms: row.get(15)?,
            webhook_success_count: row.get(16)?,
        })
    }

    fn row_to_order(row: &Row) -> rusqlite::Result<Order> {
        Ok(Order {
            id: row.get(0)?,
            agent_id: row.get(1)?,
            symbol: row.get(2)?,
            side: Side::from_str(&row.get::<_, String>(3)?).unwrap_or(Side::Buy),
            order_type: OrderType::from_str(&row.get::<_, String>(4)?).unwrap_or(OrderType::Market),
            quantity: row.get(5)?,
            filled_quantity: row.get(6)?,
            price: row.get::<_, Option<String>>(7)?.map(|s| dec(&s)),
            status: OrderStatus::from_str(&row.get::<_, String>(8)?).unwrap_or(OrderStatus::Pending),
            tick_submitted: row.get(9)?,
        })
    }

    fn row_to_trade(row: &Row) -> rusqlite::Result<Trade> {
        Ok(Trade {
            id: row.get(0)?,
            symbol: row.get(1)?,
            buyer_id: row.get(2)?,
            seller_id: row.get(3)?,
            buyer_order_id: row.get(4)?,
            seller_order_id: row.get(5)?,
            price: dec(&row.get::<_, String>(6)?),
            quantity: row.get(7)?,
            tick: row.get(8)?,
        })
    }

    fn row_to_company(row: &Row) -> rusqlite::Result<Company> {
        Ok(Company {
            symbol: row.get(0)?,
            name: row.get(1)?,
            sector: row.get(2)?,
            current_price: dec(&row.get::<_, String>(3)?),
            previous_close: dec(&row.get::<_, String>(4)?),
            open: dec(&row.get::<_, String>(5)?),
            high: dec(&row.get::<_, String>(6)?),
            low: dec(&row.get::<_, String>(7)?),
            market_cap: dec(&row.get::<_, String>(8)?),
            shares_outstanding: row.get(9)?,
            volatility: dec(&row.get::<_, String>(10)?),
            beta: dec(&row.get::<_, String>(11)?),
            sentiment: dec(&row.get::<_, String>(12)?),
            is_public: row.get::<_, i64>(13)? != 0,
        })
    }

    fn row_to_holding(row: &Row) -> rusqlite::Result<Holding> {
        Ok(Holding {
            agent_id: row.get(0)?,
            symbol: row.get(1)?,
            quantity: row.get(2)?,
            avg_cost: dec(&row.get::<_, String>(3)?),
        })
    }

    fn row_to_news(row: &Row) -> rusqlite::Result<NewsArticle> {
        let symbols: String = row.get(6)?;
        let agent_ids: String = row.get(7)?;
        Ok(NewsArticle {
            id: row.get(0)?,
            tick: row.get(1)?,
            headline: row.get(2)?,
            content: row.get(3)?,
            category: row.get(4)?,
            sentiment: row.get(5)?,
            symbols: serde_json::from_str(&symbols).unwrap_or_default(),
            agent_ids: serde_json::from_str(&agent_ids).unwrap_or_default(),
            is_breaking: row.get::<_, i64>(8)? != 0,
        })
    }

    fn row_to_message(row: &Row) -> rusqlite::Result<Message> {
        Ok(Message {
            id: row.get(0)?,
            tick: row.get(1)?,
            sender_id: row.get(2)?,
            recipient_id: row.get(3)?,
            channel: row.get(4)?,
            subject: row.get(5)?,
            content: row.get(6)?,
            is_read: row.get::<_, i64>(7)? != 0,
            is_deleted: row.get::<_, i64>(8)? != 0,
            read_at: row.get(9)?,
        })
    }

    fn row_to_alliance(row: &Row) -> rusqlite::Result<Alliance> {
        Ok(Alliance {
            id: row.get(0)?,
            proposer_id: row.get(1)?,
            partner_id: row.get(2)?,
            status: AllianceStatus::from_str(&row.get::<_, String>(3)?).unwrap_or(AllianceStatus::Pending),
            dissolution_reason: row.get(4)?,
        })
    }

    fn row_to_investigation(row: &Row) -> rusqlite::Result<Investigation> {
        let crime_str: String = row.get(2)?;
        Ok(Investigation {
            id: row.get(0)?,
            target_agent_id: row.get(1)?,
            crime_type: crime_type_from_str(&crime_str),
            status: InvestigationStatus::from_str(&row.get::<_, String>(3)?).unwrap_or(InvestigationStatus::Open),
            tick_opened: row.get(4)?,
            tick_charged: row.get(5)?,
            fine_amount: row.get::<_, Option<String>>(6)?.map(|s| dec(&s)),
            sentence_years: row.get(7)?,
            imprisoned_until_tick: row.get(8)?,
        })
    }
}

fn crime_type_as_str(c: CrimeType) -> &'static str {
    match c {
        CrimeType::InsiderTrading => "insider_trading",
        CrimeType::MarketManipulation => "market_manipulation",
        CrimeType::Spoofing => "spoofing",
        CrimeType::WashTrading => "wash_trading",
        CrimeType::PumpAndDump => "pump_and_dump",
        CrimeType::Coordination => "coordination",
        CrimeType::AccountingFraud => "accounting_fraud",
        CrimeType::Bribery => "bribery",
        CrimeType::TaxEvasion => "tax_evasion",
        CrimeType::Obstruction => "obstruction",
    }
}

fn crime_type_from_str(s: &str) -> CrimeType {
    match s {
        "market_manipulation" => CrimeType::MarketManipulation,
        "spoofing" => CrimeType::Spoofing,
        "wash_trading" => CrimeType::WashTrading,
        "pump_and_dump" => CrimeType::PumpAndDump,
        "coordination" => CrimeType::Coordination,
        "accounting_fraud" => CrimeType::AccountingFraud,
        "bribery" => CrimeType::Bribery,
        "tax_evasion" => CrimeType::TaxEvasion,
        "obstruction" => CrimeType::Obstruction,
        _ => CrimeType::InsiderTrading,
    }
}

impl PersistenceGateway for SqliteGateway {
    fn create_agent(&self, agent: &Agent) -> GatewayResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO agents (id, display_name, role, status, cash, margin_used,
                margin_limit, reputation, alliance_id, webhook_url, webhook_secret,
                webhook_failures, last_webhook_error, last_webhook_success_at,
                last_response_time_ms, avg_response_time_ms, webhook_success_count)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17)",
            params![
                agent.id,
                agent.display_name,
                agent.role,
                agent.status.as_str(),
                agent.cash.to_string(),
                agent.margin_used.to_string(),
                agent.margin_limit.to_string(),
                agent.reputation,
                agent.alliance_id,
                agent.webhook_url,
                agent.webhook_secret,
                agent.webhook_failures,
                agent.last_webhook_error,
                agent.last_webhook_success_at,
                agent.last_response_time_ms,
                agent.avg_response_time_ms,
                agent.webhook_success_count,
            ],
        )?;
        Ok(())
    }

    fn get_agent(&self, id: &str) -> GatewayResult<Option<Agent>> {
        let conn = self.conn.lock();
        let agent = conn
            .query_row(
                "SELECT id, display_name, role, status, cash, margin_used, margin_limit,
                    reputation, alliance_id, webhook_url, webhook_secret, webhook_failures,
                    last_webhook_error, last_webhook_success_at, last_response_time_ms,
                    avg_response_time_ms, webhook_success_count FROM agents WHERE id = ?1",
                params![id],
                Self::row_to_agent,
            )
            .optional()?;
        Ok(agent)
    }

    fn update_agent(&self, agent: &Agent) -> GatewayResult<()> {
        self.create_agent(agent)
    }

    fn list_agents(&self) -> GatewayResult<Vec<Agent>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, display_name, role, status, cash, margin_used, margin_limit,
                reputation, alliance_id, webhook_url, webhook_secret, webhook_failures,
                last_webhook_error, last_webhook_success_at, last_response_time_ms,
                avg_response_time_ms, webhook_success_count FROM agents",
        )?;
        let rows = stmt.query_map([], Self::row_to_agent)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn insert_order(&self, order: &Order) -> GatewayResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO orders (id, agent_id, symbol, side, order_type, quantity,
                filled_quantity, price, status, tick_submitted) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                order.id,
                order.agent_id,
                order.symbol,
                order.side.as_str(),
                order.order_type.as_str(),
                order.quantity,
                order.filled_quantity,
                order.price.map(|p| p.to_string()),
                order.status.as_str(),
                order.tick_submitted,
            ],
        )?;
        Ok(())
    }

    fn update_order(&self, order: &Order) -> GatewayResult<()> {
        self.insert_order(order)
    }

    fn get_order(&self, id: &str) -> GatewayResult<Option<Order>> {
        let conn = self.conn.lock();
        let order = conn
            .query_row(
                "SELECT id, agent_id, symbol, side, order_type, quantity, filled_quantity,
                    price, status, tick_submitted FROM orders WHERE id = ?1",
                params![id],
                Self::row_to_order,
            )
            .optional()?;
        Ok(order)
    }

    fn list_open_orders(&self, symbol: &str) -> GatewayResult<Vec<Order>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, agent_id, symbol, side, order_type, quantity, filled_quantity,
                price, status, tick_submitted FROM orders
             WHERE symbol = ?1 AND status IN ('pending','open','partial')",
        )?;
        let rows = stmt.query_map(params![symbol], Self::row_to_order)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn list_open_orders_for_agent(&self, agent_id: &str) -> GatewayResult<Vec<Order>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, agent_id, symbol, side, order_type, quantity, filled_quantity,
                price, status, tick_submitted FROM orders
             WHERE agent_id = ?1 AND status IN ('pending','open','partial')",
        )?;
        let rows = stmt.query_map(params![agent_id], Self::row_to_order)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn insert_trade(&self, trade: &Trade) -> GatewayResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO trades (id, symbol, buyer_id, seller_id, buyer_order_id,
                seller_order_id, price, quantity, tick) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
            params![
                trade.id,
                trade.symbol,
                trade.buyer_id,
                trade.seller_id,
                trade.buyer_order_id,
                trade.seller_order_id,
                trade.price.to_string(),
                trade.quantity,
                trade.tick,
            ],
        )?;
        Ok(())
    }

    fn list_trades(&self, symbol: &str, limit: usize) -> GatewayResult<Vec<Trade>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, symbol, buyer_id, seller_id, buyer_order_id, seller_order_id, price,
                quantity, tick FROM trades WHERE symbol = ?1 ORDER BY tick DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![symbol, limit as i64], Self::row_to_trade)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn get_company(&self, symbol: &str) -> GatewayResult<Option<Company>> {
        let conn = self.conn.lock();
        let company = conn
            .query_row(
                "SELECT symbol, name, sector, current_price, previous_close, open, high, low,
                    market_cap, shares_outstanding, volatility, beta, sentiment, is_public
                 FROM companies WHERE symbol = ?1",
                params![symbol],
                Self::row_to_company,
            )
            .optional()?;
        Ok(company)
    }

    fn list_companies(&self) -> GatewayResult<Vec<Company>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT symbol, name, sector, current_price, previous_close, open, high, low,
                market_cap, shares_outstanding, volatility, beta, sentiment, is_public FROM companies",
        )?;
        let rows = stmt.query_map([], Self::row_to_company)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn update_company(&self, company: &Company) -> GatewayResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO companies (symbol, name, sector, current_price,
                previous_close, open, high, low, market_cap, shares_outstanding, volatility,
                beta, sentiment, is_public) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)",
            params![
                company.symbol,
                company.name,
                company.sector,
                company.current_price.to_string(),
                company.previous_close.to_string(),
                company.open.to_string(),
                company.high.to_string(),
                company.low.to_string(),
                company.market_cap.to_string(),
                company.shares_outstanding,
                company.volatility.to_string(),
                company.beta.to_string(),
                company.sentiment.to_string(),
                company.is_public as i64,
            ],
        )?;
        Ok(())
    }

    fn upsert_holding(&self, holding: &Holding) -> GatewayResult<()> {
        let conn = self.conn.lock();
        if holding.quantity == 0 {
            conn.execute(
                "DELETE FROM holdings WHERE agent_id = ?1 AND symbol = ?2",
                params![holding.agent_id, holding.symbol],
            )?;
        } else {
            conn.execute(
                "INSERT OR REPLACE INTO holdings (agent_id, symbol, quantity, avg_cost)
                 VALUES (?1,?2,?3,?4)",
                params![
                    holding.agent_id,
                    holding.symbol,
                    holding.quantity,
                    holding.avg_cost.to_string(),
                ],
            )?;
        }
        Ok(())
    }

    fn get_holding(&self, agent_id: &str, symbol: &str) -> GatewayResult<Option<Holding>> {
        let conn = self.conn.lock();
        let holding = conn
            .query_row(
                "SELECT agent_id, symbol, quantity, avg_cost FROM holdings
                 WHERE agent_id = ?1 AND symbol = ?2",
                params![agent_id, symbol],
                Self::row_to_holding,
            )
            .optional()?;
        Ok(holding)
    }

    fn list_holdings_for(&self, agent_id: &str) -> GatewayResult<Vec<Holding>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT agent_id, symbol, quantity, avg_cost FROM holdings WHERE agent_id = ?1",
        )?;
        let rows = stmt.query_map(params![agent_id], Self::row_to_holding)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn insert_news(&self, article: &NewsArticle) -> GatewayResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO news (id, tick, headline, content, category, sentiment, symbols,
                agent_ids, is_breaking) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
            params![
                article.id,
                article.tick,
                article.headline,
                article.content,
                article.category,
                article.sentiment,
                serde_json::to_string(&article.symbols).unwrap_or_default(),
                serde_json::to_string(&article.agent_ids).unwrap_or_default(),
                article.is_breaking as i64,
            ],
        )?;
        Ok(())
    }

    fn list_news(&self, limit: usize) -> GatewayResult<Vec<NewsArticle>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, tick, headline, content, category, sentiment, symbols, agent_ids,
                is_breaking FROM news ORDER BY tick DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], Self::row_to_news)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn insert_message(&self, message: &Message) -> GatewayResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO messages (id, tick, sender_id, recipient_id, channel, subject,
                content, is_read, is_deleted, read_at) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                message.id,
                message.tick,
                message.sender_id,
                message.recipient_id,
                message.channel,
                message.subject,
                message.content,
                message.is_read as i64,
                message.is_deleted as i64,
                message.read_at,
            ],
        )?;
        Ok(())
    }

    fn list_messages_for(&self, agent_id: &str) -> GatewayResult<Vec<Message>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, tick, sender_id, recipient_id, channel, subject, content, is_read,
                is_deleted, read_at FROM messages
             WHERE recipient_id = ?1 AND is_deleted = 0 ORDER BY tick DESC",
        )?;
        let rows = stmt.query_map(params![agent_id], Self::row_to_message)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn find_alliance_proposal(&self, alliance_id: &str, recipient_id: &str) -> GatewayResult<Option<Message>> {
        let conn = self.conn.lock();
        let needle = format!("%{}%", alliance_id);
        let message = conn
            .query_row(
                "SELECT id, tick, sender_id, recipient_id, channel, subject, content, is_read,
                    is_deleted, read_at FROM messages
                 WHERE channel = 'alliance' AND recipient_id = ?1 AND subject LIKE ?2
                 ORDER BY tick DESC LIMIT 1",
                params![recipient_id, needle],
                Self::row_to_message,
            )
            .optional()?;
        Ok(message)
    }

    fn insert_alliance(&self, alliance: &Alliance) -> GatewayResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO alliances (id, proposer_id, partner_id, status,
                dissolution_reason) VALUES (?1,?2,?3,?4,?5)",
            params![
                alliance.id,
                alliance.proposer_id,
                alliance.partner_id,
                alliance.status.as_str(),
                alliance.dissolution_reason,
            ],
        )?;
        Ok(())
    }

    fn get_alliance(&self, id: &str) -> GatewayResult<Option<Alliance>> {
        let conn = self.conn.lock();
        let alliance = conn
            .query_row(
                "SELECT id, proposer_id, partner_id, status, dissolution_reason
                 FROM alliances WHERE id = ?1",
                params![id],
                Self::row_to_alliance,
            )
            .optional()?;
        Ok(alliance)
    }

    fn update_alliance(&self, alliance: &Alliance) -> GatewayResult<()> {
        self.insert_alliance(alliance)
    }

    fn insert_investigation(&self, investigation: &Investigation) -> GatewayResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO investigations (id, target_agent_id, crime_type, status,
                tick_opened, tick_charged, fine_amount, sentence_years, imprisoned_until_tick)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
            params![
                investigation.id,
                investigation.target_agent_id,
                crime_type_as_str(investigation.crime_type),
                investigation.status.as_str(),
                investigation.tick_opened,
                investigation.tick_charged,
                investigation.fine_amount.map(|f| f.to_string()),
                investigation.sentence_years,
                investigation.imprisoned_until_tick,
            ],
        )?;
        Ok(())
    }

    fn get_open_investigation_for(&self, agent_id: &str) -> GatewayResult<Option<Investigation>> {
        let conn = self.conn.lock();
        let investigation = conn
            .query_row(
                "SELECT id, target_agent_id, crime_type, status, tick_opened, tick_charged,
                    fine_amount, sentence_years, imprisoned_until_tick FROM investigations
                 WHERE target_agent_id = ?1 AND status IN ('open','charged')
                 ORDER BY tick_opened DESC LIMIT 1",
                params![agent_id],
                Self::row_to_investigation,
            )
            .optional()?;
        Ok(investigation)
    }

    fn update_investigation(&self, investigation: &Investigation) -> GatewayResult<()> {
        self.insert_investigation(investigation)
    }

    fn list_most_wanted(&self, limit: usize) -> GatewayResult<Vec<Investigation>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, target_agent_id, crime_type, status, tick_opened, tick_charged,
                fine_amount, sentence_years, imprisoned_until_tick FROM investigations
             WHERE status IN ('open','charged') ORDER BY tick_opened DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], Self::row_to_investigation)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn list_imprisoned(&self, limit: usize) -> GatewayResult<Vec<Agent>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, display_name, role, status, cash, margin_used, margin_limit,
                reputation, alliance_id, webhook_url, webhook_secret, webhook_failures,
                last_webhook_error, last_webhook_success_at, last_response_time_ms,
                avg_response_time_ms, webhook_success_count FROM agents
             WHERE status = 'imprisoned' LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], Self::row_to_agent)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn log_action(&self, entry: &ActionLogEntry) -> GatewayResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO action_log (tick, agent_id, action_type, target_symbol,
                target_agent_id, payload, result) VALUES (?1,?2,?3,?4,?5,?6,?7)",
            params![
                entry.tick,
                entry.agent_id,
                entry.action_type,
                entry.target_symbol,
                entry.target_agent_id,
                entry.payload.to_string(),
                entry.result.to_string(),
            ],
        )?;
        Ok(())
    }

    fn insert_tick_event(&self, record: &TickEventRecord) -> GatewayResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO tick_events (tick, timestamp, trades, news, price_updates)
             VALUES (?1,?2,?3,?4,?5)",
            params![
                record.tick,
                record.timestamp,
                serde_json::to_string(&record.trades).unwrap_or_default(),
                serde_json::to_string(&record.news).unwrap_or_default(),
                serde_json::to_string(&record.price_updates).unwrap_or_default(),
            ],
        )?;
        Ok(())
    }

    fn get_tick_events_since(&self, tick: u64) -> GatewayResult<Vec<TickEventRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT tick, timestamp, trades, news, price_updates FROM tick_events
             WHERE tick > ?1 ORDER BY tick ASC",
        )?;
        let rows = stmt.query_map(params![tick], |row| {
            let trades: String = row.get(2)?;
            let news: String = row.get(3)?;
            let price_updates: String = row.get(4)?;
            Ok(TickEventRecord {
                tick: row.get(0)?,
                timestamp: row.get(1)?,
                trades: serde_json::from_str(&trades).unwrap_or_default(),
                news: serde_json::from_str(&news).unwrap_or_default(),
                price_updates: serde_json::from_str(&price_updates).unwrap_or_default(),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn prune_tick_events_before(&self, tick: u64) -> GatewayResult<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM tick_events WHERE tick < ?1", params![tick])?;
        Ok(())
    }

    fn oldest_retained_tick(&self) -> GatewayResult<Option<u64>> {
        let conn = self.conn.lock();
        let tick: Option<i64> = conn
            .query_row("SELECT MIN(tick) FROM tick_events", [], |row| row.get(0))
            .optional()?
            .flatten();
        Ok(tick.map(|t| t as u64))
    }

    fn get_world_state(&self) -> GatewayResult<WorldState> {
        let conn = self.conn.lock();
        let state = conn
            .query_row(
                "SELECT tick, market_open, regime, interest_rate, inflation_rate, gdp_growth,
                    last_tick_at FROM world_state WHERE id = 0",
                [],
                |row| {
                    Ok(WorldState {
                        tick: row.get(0)?,
                        market_open: row.get::<_, i64>(1)? != 0,
                        regime: crate::domain::MarketRegime::from_str(&row.get::<_, String>(2)?)
                            .unwrap_or(crate::domain::MarketRegime::Normal),
                        interest_rate: dec(&row.get::<_, String>(3)?),
                        inflation_rate: dec(&row.get::<_, String>(4)?),
                        gdp_growth: dec(&row.get::<_, String>(5)?),
                        last_tick_at: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(state.unwrap_or_default())
    }

    fn save_world_state(&self, state: &WorldState) -> GatewayResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO world_state (id, tick, market_open, regime, interest_rate,
                inflation_rate, gdp_growth, last_tick_at) VALUES (0,?1,?2,?3,?4,?5,?6,?7)",
            params![
                state.tick,
                state.market_open as i64,
                state.regime.as_str(),
                state.interest_rate.to_string(),
                state.inflation_rate.to_string(),
                state.gdp_growth.to_string(),
                state.last_tick_at,
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn agent_round_trip() {
        let gw = SqliteGateway::open_in_memory().unwrap();
        let agent = Agent::new("agent-1", "Trader One", dec!(10000));
        gw.create_agent(&agent).unwrap();
        let fetched = gw.get_agent("agent-1").unwrap().unwrap();
        assert_eq!(fetched.cash, dec!(10000));
        assert_eq!(fetched.display_name, "Trader One");
    }

    #[test]
    fn holding_delete_on_zero_quantity() {
        let gw = SqliteGateway::open_in_memory().unwrap();
        gw.upsert_holding(&Holding {
            agent_id: "a".into(),
            symbol: "ACME".into(),
            quantity: 10,
            avg_cost: dec!(5),
        })
        .unwrap();
        assert!(gw.get_holding("a", "ACME").unwrap().is_some());
        gw.upsert_holding(&Holding {
            agent_id: "a".into(),
            symbol: "ACME".into(),
            quantity: 0,
            avg_cost: dec!(5),
        })
        .unwrap();
        assert!(gw.get_holding("a", "ACME").unwrap().is_none());
    }

    #[test]
    fn tick_event_retention_prune() {
        let gw = SqliteGateway::open_in_memory().unwrap();
        for tick in 0..5 {
            gw.insert_tick_event(&TickEventRecord {
                tick,
                timestamp: 0,
                trades: vec![],
                news: vec![],
                price_updates: vec![],
            })
            .unwrap();
        }
        gw.prune_tick_events_before(3).unwrap();
        assert_eq!(gw.oldest_retained_tick().unwrap(), Some(3));
    }

    #[test]
    fn world_state_defaults_when_absent() {
        let gw = SqliteGateway::open_in_memory().unwrap();
        let state = gw.get_world_state().unwrap();
        assert_eq!(state.tick, 0);
        assert!(state.market_open);
    }
}
