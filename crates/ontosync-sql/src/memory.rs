//! In-memory relational catalog.
//!
//! Executes the DDL subset the adapter emits (`CREATE TABLE`,
//! `ALTER TABLE ... ADD/DROP COLUMN`, `DROP TABLE`) against a per-repository
//! catalog, parsing statements with `sqlparser` and reporting failures with
//! PostgreSQL SQLSTATE codes. Foreign keys are tracked so that dropping a
//! referenced table fails the way a real server does.
//!
//! Transactions stage their statements on a private copy of the catalog and
//! replay them on the live catalog at commit.

use crate::executor::{
    sqlstate, ColumnDescription, ForeignKeyRef, RelationalExecutor, RelationalTransaction,
    TableDescription,
};
use ontosync_model::{Backend, ClientError};
use parking_lot::Mutex;
use sqlparser::ast::{
    AlterTableOperation, ColumnDef, ColumnOption, Ident, ObjectName, ObjectType, Statement,
    TableConstraint,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn sql_error(status: &str, message: impl Into<String>) -> ClientError {
    ClientError::new(Backend::Relational, message).with_status(status)
}

fn object_name(name: &ObjectName) -> String {
    name.0
        .last()
        .map(|ident| ident.value.to_lowercase())
        .unwrap_or_default()
}

fn ident_name(ident: &Ident) -> String {
    ident.value.to_lowercase()
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Debug, Clone, Default)]
struct Catalog {
    tables: BTreeMap<String, TableDescription>,
}

impl Catalog {
    fn apply(&mut self, statement: &Statement) -> Result<(), ClientError> {
        match statement {
            Statement::CreateTable {
                name,
                columns,
                constraints,
                if_not_exists,
                ..
            } => self.create_table(object_name(name), columns, constraints, *if_not_exists),
            Statement::AlterTable {
                name, operations, ..
            } => self.alter_table(object_name(name), operations),
            Statement::Drop {
                object_type,
                if_exists,
                names,
                cascade,
                ..
            } => {
                if *object_type != ObjectType::Table {
                    return Err(sql_error(
                        sqlstate::FEATURE_NOT_SUPPORTED,
                        format!("DROP {object_type} is not supported"),
                    ));
                }
                for name in names {
                    self.drop_table(object_name(name), *if_exists, *cascade)?;
                }
                Ok(())
            }
            other => Err(sql_error(
                sqlstate::FEATURE_NOT_SUPPORTED,
                format!("statement not supported by the in-memory catalog: {other}"),
            )),
        }
    }

    fn create_table(
        &mut self,
        table: String,
        columns: &[ColumnDef],
        constraints: &[TableConstraint],
        if_not_exists: bool,
    ) -> Result<(), ClientError> {
        if self.tables.contains_key(&table) {
            if if_not_exists {
                return Ok(());
            }
            return Err(sql_error(
                sqlstate::DUPLICATE_TABLE,
                format!("relation \"{table}\" already exists"),
            ));
        }

        let mut described: Vec<ColumnDescription> = Vec::with_capacity(columns.len());
        for def in columns {
            let column = self.column_from_def(def, &table, &described)?;
            if described.iter().any(|c| c.name == column.name) {
                return Err(sql_error(
                    sqlstate::DUPLICATE_COLUMN,
                    format!("column \"{}\" specified more than once", column.name),
                ));
            }
            described.push(column);
        }

        for constraint in constraints {
            match constraint {
                TableConstraint::Unique {
                    columns: unique_columns,
                    is_primary,
                    ..
                } => {
                    for ident in unique_columns {
                        let name = ident_name(ident);
                        let column = described
                            .iter_mut()
                            .find(|c| c.name == name)
                            .ok_or_else(|| undefined_column(&table, &name))?;
                        column.unique = true;
                        if *is_primary {
                            column.primary_key = true;
                            column.nullable = false;
                        }
                    }
                }
                TableConstraint::ForeignKey {
                    columns: fk_columns,
                    foreign_table,
                    referred_columns,
                    ..
                } => {
                    let target = self.resolve_reference(
                        &table,
                        &described,
                        foreign_table,
                        referred_columns,
                    )?;
                    for ident in fk_columns {
                        let name = ident_name(ident);
                        let column = described
                            .iter_mut()
                            .find(|c| c.name == name)
                            .ok_or_else(|| undefined_column(&table, &name))?;
                        column.references = Some(target.clone());
                    }
                }
                _ => {}
            }
        }

        self.tables.insert(
            table.clone(),
            TableDescription {
                name: table,
                columns: described,
            },
        );
        Ok(())
    }

    fn alter_table(
        &mut self,
        table: String,
        operations: &[AlterTableOperation],
    ) -> Result<(), ClientError> {
        if !self.tables.contains_key(&table) {
            return Err(undefined_table(&table));
        }

        for operation in operations {
            match operation {
                AlterTableOperation::AddColumn { column_def, .. } => {
                    let existing = self.tables[&table].columns.clone();
                    let column = self.column_from_def(column_def, &table, &existing)?;
                    if existing.iter().any(|c| c.name == column.name) {
                        return Err(sql_error(
                            sqlstate::DUPLICATE_COLUMN,
                            format!(
                                "column \"{}\" of relation \"{table}\" already exists",
                                column.name
                            ),
                        ));
                    }
                    if let Some(described) = self.tables.get_mut(&table) {
                        described.columns.push(column);
                    }
                }
                AlterTableOperation::DropColumn {
                    column_name,
                    if_exists,
                    cascade,
                    ..
                } => {
                    let column = ident_name(column_name);
                    if self.tables[&table].column(&column).is_none() {
                        if *if_exists {
                            continue;
                        }
                        return Err(undefined_column(&table, &column));
                    }
                    let target = ForeignKeyRef::new(table.clone(), column.clone());
                    let dependents = self.referencing(|r| *r == target, &table);
                    if !dependents.is_empty() {
                        if !*cascade {
                            return Err(sql_error(
                                sqlstate::DEPENDENT_OBJECTS_STILL_EXIST,
                                format!(
                                    "cannot drop column {column} of table {table} because other objects depend on it ({})",
                                    dependents.join(", ")
                                ),
                            ));
                        }
                        self.strip_references(|r| *r == target);
                    }
                    if let Some(described) = self.tables.get_mut(&table) {
                        described.columns.retain(|c| c.name != column);
                    }
                }
                other => {
                    return Err(sql_error(
                        sqlstate::FEATURE_NOT_SUPPORTED,
                        format!("ALTER TABLE operation not supported: {other}"),
                    ))
                }
            }
        }
        Ok(())
    }

    fn drop_table(&mut self, table: String, if_exists: bool, cascade: bool) -> Result<(), ClientError> {
        if !self.tables.contains_key(&table) {
            if if_exists {
                return Ok(());
            }
            return Err(undefined_table(&table));
        }

        let dependents = self.referencing(|r| r.table == table, &table);
        if !dependents.is_empty() {
            if !cascade {
                return Err(sql_error(
                    sqlstate::DEPENDENT_OBJECTS_STILL_EXIST,
                    format!(
                        "cannot drop table {table} because other objects depend on it ({})",
                        dependents.join(", ")
                    ),
                ));
            }
            self.strip_references(|r| r.table == table);
        }
        self.tables.remove(&table);
        Ok(())
    }

    fn column_from_def(
        &self,
        def: &ColumnDef,
        table: &str,
        siblings: &[ColumnDescription],
    ) -> Result<ColumnDescription, ClientError> {
        let mut column = ColumnDescription {
            name: ident_name(&def.name),
            data_type: def.data_type.to_string(),
            nullable: true,
            unique: false,
            primary_key: false,
            references: None,
        };
        for option in &def.options {
            match &option.option {
                ColumnOption::NotNull => column.nullable = false,
                ColumnOption::Unique { is_primary, .. } => {
                    column.unique = true;
                    if *is_primary {
                        column.primary_key = true;
                        column.nullable = false;
                    }
                }
                ColumnOption::ForeignKey {
                    foreign_table,
                    referred_columns,
                    ..
                } => {
                    column.references = Some(self.resolve_reference(
                        table,
                        siblings,
                        foreign_table,
                        referred_columns,
                    )?);
                }
                _ => {}
            }
        }
        Ok(column)
    }

    fn resolve_reference(
        &self,
        table: &str,
        siblings: &[ColumnDescription],
        foreign_table: &ObjectName,
        referred_columns: &[Ident],
    ) -> Result<ForeignKeyRef, ClientError> {
        let target_table = object_name(foreign_table);
        let Some(target_column) = referred_columns.first().map(ident_name) else {
            return Err(sql_error(
                sqlstate::FEATURE_NOT_SUPPORTED,
                format!("foreign key to \"{target_table}\" must name the referenced column"),
            ));
        };

        let columns: &[ColumnDescription] = if target_table == table {
            siblings
        } else {
            match self.tables.get(&target_table) {
                Some(described) => &described.columns,
                None => return Err(undefined_table(&target_table)),
            }
        };
        if !columns.iter().any(|c| c.name == target_column) {
            return Err(undefined_column(&target_table, &target_column));
        }
        Ok(ForeignKeyRef::new(target_table, target_column))
    }

    /// `table.column` names of columns in other tables whose reference
    /// matches.
    fn referencing(&self, matches: impl Fn(&ForeignKeyRef) -> bool, except: &str) -> Vec<String> {
        let mut dependents = Vec::new();
        for described in self.tables.values().filter(|t| t.name != except) {
            for column in &described.columns {
                if column.references.as_ref().is_some_and(&matches) {
                    dependents.push(format!("{}.{}", described.name, column.name));
                }
            }
        }
        dependents
    }

    fn strip_references(&mut self, matches: impl Fn(&ForeignKeyRef) -> bool) {
        for described in self.tables.values_mut() {
            for column in &mut described.columns {
                if column.references.as_ref().is_some_and(&matches) {
                    column.references = None;
                }
            }
        }
    }
}

fn undefined_table(table: &str) -> ClientError {
    sql_error(
        sqlstate::UNDEFINED_TABLE,
        format!("relation \"{table}\" does not exist"),
    )
}

fn undefined_column(table: &str, column: &str) -> ClientError {
    sql_error(
        sqlstate::UNDEFINED_COLUMN,
        format!("column \"{column}\" of relation \"{table}\" does not exist"),
    )
}

fn parse(sql: &str) -> Result<Vec<Statement>, ClientError> {
    let dialect = GenericDialect {};
    Parser::parse_sql(&dialect, sql).map_err(|e| sql_error(sqlstate::SYNTAX_ERROR, e.to_string()))
}

// ============================================================================
// Executor
// ============================================================================

#[derive(Debug, Clone)]
struct InjectedFailure {
    fragment: String,
    error: ClientError,
}

type Repositories = Arc<Mutex<BTreeMap<String, Catalog>>>;

/// Embedded relational backend with one catalog per repository.
#[derive(Debug, Clone, Default)]
pub struct MemoryRelationalExecutor {
    repositories: Repositories,
    failures: Arc<Mutex<Vec<InjectedFailure>>>,
    transactions: Arc<AtomicUsize>,
    statements: Arc<Mutex<Vec<String>>>,
}

impl MemoryRelationalExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next statement containing `fragment` fail with `error`.
    pub fn fail_next(&self, fragment: impl Into<String>, error: ClientError) {
        self.failures.lock().push(InjectedFailure {
            fragment: fragment.into(),
            error,
        });
    }

    /// Execute `sql` in its own committed transaction.
    pub fn execute(&self, repository: &str, sql: &str) -> Result<(), ClientError> {
        let mut tx = self.begin(repository)?;
        match tx.execute_ddl(sql) {
            Ok(()) => tx.commit(),
            Err(err) => {
                tx.rollback()?;
                Err(err)
            }
        }
    }

    pub fn describe(&self, repository: &str, table: &str) -> Option<TableDescription> {
        self.repositories
            .lock()
            .get(repository)
            .and_then(|catalog| catalog.tables.get(&table.to_lowercase()).cloned())
    }

    pub fn table_names(&self, repository: &str) -> Vec<String> {
        self.repositories
            .lock()
            .get(repository)
            .map(|catalog| catalog.tables.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of transactions begun so far.
    pub fn transactions_begun(&self) -> usize {
        self.transactions.load(Ordering::SeqCst)
    }

    /// Every DDL statement received, in order (including failed ones).
    pub fn statement_log(&self) -> Vec<String> {
        self.statements.lock().clone()
    }
}

impl RelationalExecutor for MemoryRelationalExecutor {
    fn begin(&self, repository: &str) -> Result<Box<dyn RelationalTransaction>, ClientError> {
        self.transactions.fetch_add(1, Ordering::SeqCst);
        let staged = self
            .repositories
            .lock()
            .get(repository)
            .cloned()
            .unwrap_or_default();
        Ok(Box::new(MemoryTransaction {
            repositories: Arc::clone(&self.repositories),
            failures: Arc::clone(&self.failures),
            log: Arc::clone(&self.statements),
            repository: repository.to_string(),
            staged,
            statements: Vec::new(),
        }))
    }
}

struct MemoryTransaction {
    repositories: Repositories,
    failures: Arc<Mutex<Vec<InjectedFailure>>>,
    log: Arc<Mutex<Vec<String>>>,
    repository: String,
    staged: Catalog,
    statements: Vec<Statement>,
}

impl MemoryTransaction {
    fn take_injected(&self, sql: &str) -> Option<ClientError> {
        let mut failures = self.failures.lock();
        let index = failures.iter().position(|f| sql.contains(&f.fragment))?;
        Some(failures.remove(index).error)
    }
}

impl RelationalTransaction for MemoryTransaction {
    fn execute_ddl(&mut self, statement: &str) -> Result<(), ClientError> {
        self.log.lock().push(statement.to_string());
        if let Some(err) = self.take_injected(statement) {
            return Err(err);
        }
        for parsed in parse(statement)? {
            self.staged.apply(&parsed)?;
            self.statements.push(parsed);
        }
        Ok(())
    }

    fn describe_table(&mut self, table: &str) -> Result<Option<TableDescription>, ClientError> {
        Ok(self.staged.tables.get(&table.to_lowercase()).cloned())
    }

    fn commit(self: Box<Self>) -> Result<(), ClientError> {
        let mut repositories = self.repositories.lock();
        let live = repositories.entry(self.repository.clone()).or_default();
        let mut next = live.clone();
        for statement in &self.statements {
            next.apply(statement)?;
        }
        *live = next;
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<(), ClientError> {
        Ok(())
    }
}
