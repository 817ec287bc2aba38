#![cfg(feature = "sqlite")]

use serde::{Deserialize, Serialize};
use sql_fluent::prelude::*;

const NORTHWIND: &str = "
    CREATE TABLE Categories (CategoryID INTEGER PRIMARY KEY, CategoryName TEXT NOT NULL, Picture BLOB);
    INSERT INTO Categories (CategoryID, CategoryName, Picture) VALUES
        (1, 'Beverages', x'0102'), (2, 'Condiments', NULL), (3, 'Confections', NULL),
        (4, 'Dairy Products', NULL), (5, 'Grains/Cereals', NULL), (6, 'Meat/Poultry', NULL),
        (7, 'Produce', NULL), (8, 'Seafood', NULL);
    CREATE TABLE Suppliers (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
    INSERT INTO Suppliers (id, name) VALUES (1, 'Exotic Liquids'), (2, 'Tokyo Traders');
    CREATE TABLE Products (id INTEGER PRIMARY KEY, name TEXT NOT NULL, category_id INTEGER, supplier_id INTEGER);
    INSERT INTO Products (id, name, category_id, supplier_id) VALUES
        (1, 'Chai', 1, 1), (2, 'Chang', 1, 1), (3, 'Aniseed Syrup', 2, NULL), (4, 'Ikura', 8, 2);
";

#[derive(Debug, Deserialize, PartialEq)]
struct Category {
    category_id: i64,
    category_name: String,
}

#[derive(Debug, Deserialize, PartialEq)]
struct Product {
    id: i64,
    name: String,
}

#[derive(Debug, Deserialize, PartialEq)]
struct Supplier {
    id: i64,
    name: String,
}

async fn northwind() -> Result<CommandSession, FluentDbError> {
    let mut session = CommandSession::connect(&ConnectionConfig::sqlite(":memory:")).await?;
    session.set_command(NORTHWIND).execute().await?;
    Ok(session)
}

#[tokio::test]
async fn lists_objects_and_scalars() -> Result<(), FluentDbError> {
    let mut session = northwind().await?;

    let categories: Vec<Category> = session
        .set_command("SELECT CategoryID, CategoryName FROM Categories ORDER BY CategoryID")
        .execute_list()
        .await?;
    assert_eq!(categories.len(), 8);
    assert_eq!(categories[7].category_name, "Seafood");

    session
        .set_command("SELECT CategoryID, CategoryName FROM Categories WHERE CategoryID = @id")
        .set_parameter("@id", 3);
    let confections: Option<Category> = session.execute_object().await?;
    assert_eq!(
        confections,
        Some(Category {
            category_id: 3,
            category_name: "Confections".into()
        })
    );

    session.set_parameter("@id", 99);
    assert_eq!(session.execute_object::<Category>().await?, None);
    assert!(session.execute_list::<Category>().await?.is_empty());

    let count: Option<i64> = session
        .set_command("SELECT COUNT(*) FROM Categories")
        .execute_scalar()
        .await?;
    assert_eq!(count, Some(8));

    let missing: Option<String> = session
        .set_command("SELECT CategoryName FROM Categories WHERE CategoryID = @id")
        .execute_scalar()
        .await?;
    assert_eq!(missing, None);

    session.dispose().await;
    Ok(())
}

#[tokio::test]
async fn dictionary_keeps_column_order_and_blobs() -> Result<(), FluentDbError> {
    let mut session = northwind().await?;
    let row = session
        .set_command("SELECT CategoryID, CategoryName, Picture FROM Categories WHERE CategoryID = 1")
        .execute_dictionary()
        .await?;
    assert_eq!(
        row.keys().collect::<Vec<_>>(),
        vec!["CategoryID", "CategoryName", "Picture"]
    );
    assert_eq!(row.get("Picture"), Some(&RowValues::Blob(vec![1, 2])));

    let empty = session
        .set_command("SELECT CategoryID FROM Categories WHERE 0")
        .execute_dictionary()
        .await?;
    assert!(empty.is_empty());
    Ok(())
}

#[tokio::test]
async fn affected_rows_respect_nocount() -> Result<(), FluentDbError> {
    let mut session = northwind().await?;

    let updated = session
        .set_command("UPDATE Products SET name = name || '!' WHERE category_id = @category")
        .set_parameter("@category", 1)
        .execute()
        .await?;
    assert_eq!(updated, 2);

    let silent = session
        .set_command("SET NOCOUNT ON; DELETE FROM Products WHERE id = 4;")
        .execute()
        .await?;
    assert_eq!(silent, -1);

    let remaining: Option<i64> = session
        .set_command("SELECT COUNT(*) FROM Products")
        .execute_scalar()
        .await?;
    assert_eq!(remaining, Some(3));
    Ok(())
}

#[tokio::test]
async fn multiple_result_sets_in_order() -> Result<(), FluentDbError> {
    let mut session = northwind().await?;
    let (categories, products, totals) = session
        .set_command(
            "SELECT CategoryID, CategoryName FROM Categories WHERE CategoryID <= 2;
             SELECT id, name FROM Products ORDER BY id;
             SELECT COUNT(*) FROM Suppliers;",
        )
        .execute_multiple::<(Category, Product, i64)>()
        .await?;
    assert_eq!(categories.len(), 2);
    assert_eq!(products.len(), 4);
    assert_eq!(totals, vec![2]);

    let sets = session.execute_result_sets(2).await?;
    assert_eq!(sets.len(), 2);
    assert!(matches!(
        session.execute_result_sets(4).await,
        Err(FluentDbError::ResultSetCountMismatch {
            expected: 4,
            actual: 3
        })
    ));
    Ok(())
}

#[tokio::test]
async fn mapping_splits_rows_on_repeated_id_columns() -> Result<(), FluentDbError> {
    let mut session = northwind().await?;

    let pairs: Vec<(Product, Supplier)> = session
        .set_command(
            "SELECT p.id, p.name, s.id, s.name
             FROM Products p JOIN Suppliers s ON s.id = p.supplier_id
             ORDER BY p.id",
        )
        .execute_mapping::<(Product, Supplier), _, _>(|p: Product, s: Supplier| (p, s), "id")
        .await?
        .collect::<Result<_, _>>()?;
    assert_eq!(pairs.len(), 3);
    assert_eq!(pairs[2].0.name, "Ikura");
    assert_eq!(
        pairs[2].1,
        Supplier {
            id: 2,
            name: "Tokyo Traders".into()
        }
    );

    let names: Vec<String> = session
        .set_command(
            "SELECT p.id, p.name, s.id, s.name
             FROM Products p LEFT JOIN Suppliers s ON s.id = p.supplier_id
             ORDER BY p.id",
        )
        .execute_mapping::<(Product, Option<Supplier>), _, _>(
            |p: Product, s: Option<Supplier>| match s {
                Some(s) => format!("{} from {}", p.name, s.name),
                None => format!("{} unsourced", p.name),
            },
            "id",
        )
        .await?
        .collect::<Result<_, _>>()?;
    assert_eq!(names[2], "Aniseed Syrup unsourced");
    assert_eq!(names[0], "Chai from Exotic Liquids");

    let err = session
        .execute_mapping::<(Product, Supplier), _, _>(|p: Product, s: Supplier| (p, s), "supplier_key")
        .await
        .unwrap_err();
    assert!(matches!(err, FluentDbError::SplitColumnNotFound(_)));
    Ok(())
}

#[derive(Debug, Deserialize, PartialEq)]
struct CategoryRef {
    category_id: i64,
    category_name: String,
}

#[tokio::test]
async fn mapping_splits_three_entities_on_named_columns() -> Result<(), FluentDbError> {
    let mut session = northwind().await?;

    let rows: Vec<String> = session
        .set_command(
            "SELECT p.id, p.name, s.id, s.name, c.CategoryID, c.CategoryName
             FROM Products p
             JOIN Suppliers s ON s.id = p.supplier_id
             JOIN Categories c ON c.CategoryID = p.category_id
             ORDER BY p.id",
        )
        .execute_mapping::<(Product, Supplier, CategoryRef), _, _>(
            |p: Product, s: Supplier, c: CategoryRef| {
                format!("{}/{}/{}:{}", p.name, s.name, c.category_id, c.category_name)
            },
            "id,CategoryID",
        )
        .await?
        .collect::<Result<_, _>>()?;
    assert_eq!(
        rows,
        vec![
            "Chai/Exotic Liquids/1:Beverages",
            "Chang/Exotic Liquids/1:Beverages",
            "Ikura/Tokyo Traders/8:Seafood",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn reader_walks_every_result_set() -> Result<(), FluentDbError> {
    let mut session = northwind().await?;
    let mut reader = session
        .set_command(
            "SELECT id, name FROM Suppliers ORDER BY id;
             SELECT CategoryID, CategoryName FROM Categories WHERE CategoryID = 8;",
        )
        .execute_reader()
        .await?;

    assert_eq!(reader.columns(), ["id", "name"]);
    let first: Option<Supplier> = reader.read()?;
    assert_eq!(first.map(|s| s.id), Some(1));
    assert!(reader.next_row().is_some());
    assert!(reader.next_row().is_none());

    assert!(reader.next_result());
    let seafood: Option<Category> = reader.read()?;
    assert_eq!(seafood.map(|c| c.category_name).as_deref(), Some("Seafood"));
    assert!(!reader.next_result());
    Ok(())
}

#[tokio::test]
async fn registered_procedures_fill_output_parameters() -> Result<(), FluentDbError> {
    let options = SqliteOptions::new(":memory:").with_procedure(
        "CategoriesAbove",
        "SELECT CategoryID, CategoryName FROM Categories WHERE CategoryID > @min ORDER BY CategoryID;
         SELECT COUNT(*) AS Total, 0 AS ret FROM Categories WHERE CategoryID > @min;",
    );
    let mut session = CommandSession::new(SqliteEngine::new(options)).await?;
    session.set_command(NORTHWIND).execute().await?;

    let categories: Vec<Category> = session
        .set_procedure("CategoriesAbove")
        .set_parameter("@min", 5)
        .set_output_parameter("@Total", DbType::Int32)
        .set_return_parameter("@ret")
        .execute_list()
        .await?;
    assert_eq!(categories.len(), 3);
    assert_eq!(session.get_parameter_value::<i64>("@Total")?, 3);
    assert_eq!(session.get_parameter_value::<i64>("@ret")?, 0);

    let err = session.set_procedure("NoSuchProcedure").execute().await.unwrap_err();
    assert!(matches!(err, FluentDbError::ExecutionError(_)));
    Ok(())
}

#[tokio::test]
async fn output_declarations_leave_plain_selects_intact() -> Result<(), FluentDbError> {
    let mut session = northwind().await?;
    session.set_command("SELECT id FROM Suppliers ORDER BY id");
    let before: Vec<i64> = session.execute_list().await?;

    session.set_output_parameter("@Total", DbType::Int32);
    let after: Vec<i64> = session.execute_list().await?;
    assert_eq!(after, before);
    assert_eq!(after, vec![1, 2]);

    let (ids,) = session.execute_multiple::<(i64,)>().await?;
    assert_eq!(ids, vec![1, 2]);
    assert!(matches!(
        session.get_parameter_value::<i64>("@Total"),
        Err(FluentDbError::InvalidOperation(_))
    ));

    // a trailing set that names the output still feeds it
    let ids: Vec<i64> = session
        .set_command("SELECT id FROM Suppliers ORDER BY id; SELECT COUNT(*) AS Total FROM Suppliers;")
        .execute_list()
        .await?;
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(session.get_parameter_value::<i64>("@Total")?, 2);
    Ok(())
}

#[derive(Debug, Deserialize, PartialEq)]
struct Event {
    at: chrono::NaiveDateTime,
}

#[tokio::test]
async fn timestamps_round_trip_through_text_columns() -> Result<(), FluentDbError> {
    let mut session = CommandSession::connect(&ConnectionConfig::sqlite(":memory:")).await?;
    let at = chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
        .and_then(|d| d.and_hms_opt(8, 30, 0))
        .ok_or_else(|| FluentDbError::Argument("bad fixture date".into()))?;

    session
        .set_command("CREATE TABLE Events (id INTEGER PRIMARY KEY, at DATETIME NOT NULL)")
        .execute()
        .await?;
    session
        .set_command("INSERT INTO Events (at) VALUES (@at)")
        .set_parameter("@at", at)
        .execute()
        .await?;

    let events: Vec<Event> = session
        .clear_parameters()
        .set_command("SELECT at FROM Events")
        .execute_list()
        .await?;
    assert_eq!(events, vec![Event { at }]);

    let now: Option<Event> = session
        .set_command("SELECT CURRENT_TIMESTAMP AS at")
        .execute_object()
        .await?;
    assert!(now.is_some_and(|e| e.at > at));
    Ok(())
}

#[tokio::test]
async fn input_output_parameters_carry_values_both_ways() -> Result<(), FluentDbError> {
    let options = SqliteOptions::new(":memory:")
        .with_procedure("Bump", "SELECT @counter + @step AS counter;")
        .with_procedure(
            "CountBetween",
            "SELECT COUNT(*) AS Total FROM Categories WHERE CategoryID BETWEEN @min_id AND @max_id;",
        );
    let mut session = CommandSession::new(SqliteEngine::new(options)).await?;
    session.set_command(NORTHWIND).execute().await?;

    let step: ParameterBag = [Parameter::input("@step", 1)].into_iter().collect();
    session
        .set_procedure("Bump")
        .set_parameter_with("@counter", 5, DbType::Int64, ParameterDirection::InputOutput, None)
        .merge_parameters(step)
        .execute()
        .await?;
    assert_eq!(session.get_parameter_value::<i64>("@counter")?, 6);
    assert_eq!(session.get_parameter_value::<i64>("@step")?, 1);

    // the written-back value is the next call's input
    session.execute().await?;
    assert_eq!(session.get_parameter_value::<i64>("@counter")?, 7);

    session
        .clear_parameters()
        .set_procedure_with("CountBetween", &CategoryFilter { min_id: 3, max_id: 6 })
        .set_output_parameter("@Total", DbType::Int32)
        .execute()
        .await?;
    assert_eq!(session.get_parameter_value::<i64>("@Total")?, 4);
    Ok(())
}

#[derive(Serialize)]
struct CategoryFilter {
    min_id: i64,
    max_id: i64,
}

#[tokio::test]
async fn parameter_objects_expand_to_named_inputs() -> Result<(), FluentDbError> {
    let mut session = northwind().await?;
    let ids: Vec<i64> = session
        .set_command_with(
            "SELECT CategoryID FROM Categories WHERE CategoryID BETWEEN @min_id AND @max_id",
            &CategoryFilter { min_id: 2, max_id: 4 },
        )
        .execute_list()
        .await?;
    assert_eq!(ids, vec![2, 3, 4]);
    assert_eq!(session.parameters().len(), 2);

    // positional markers take inputs in bag order
    let names: Vec<String> = session
        .set_command("SELECT CategoryName FROM Categories WHERE CategoryID IN (?1, ?2) ORDER BY CategoryID")
        .execute_list()
        .await?;
    assert_eq!(names, vec!["Condiments", "Dairy Products"]);
    Ok(())
}

#[tokio::test]
async fn transactions_commit_and_roll_back() -> Result<(), FluentDbError> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("northwind.db");
    let config = ConnectionConfig::sqlite(path.to_string_lossy());

    let mut session = CommandSession::connect(&config).await?;
    session.set_command(NORTHWIND).execute().await?;

    assert_eq!(session.isolation_level(), None);
    session.begin_transaction(IsolationLevel::ReadUncommitted).await?;
    assert_eq!(session.isolation_level(), Some(IsolationLevel::ReadUncommitted));
    session
        .set_command("DELETE FROM Products WHERE supplier_id IS NULL")
        .execute()
        .await?;
    session.rollback_transaction().await?;
    assert_eq!(session.isolation_level(), None);

    session.begin_transaction_default().await?;
    let inserted = session
        .set_command("INSERT INTO Suppliers (id, name) VALUES (@id, @name)")
        .set_parameter("@id", 3)
        .set_parameter("@name", "Pavlova, Ltd.")
        .execute()
        .await?;
    assert_eq!(inserted, 1);
    session.commit_transaction().await?;
    session.dispose().await;

    let mut reopened = CommandSession::connect(&config).await?;
    let products: Option<i64> = reopened
        .set_command("SELECT COUNT(*) FROM Products")
        .execute_scalar()
        .await?;
    assert_eq!(products, Some(4));
    let suppliers: Option<i64> = reopened
        .set_command("SELECT COUNT(*) FROM Suppliers")
        .execute_scalar()
        .await?;
    assert_eq!(suppliers, Some(3));
    reopened.dispose().await;
    Ok(())
}
