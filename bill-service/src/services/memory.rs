//! In-process store with the same constraint semantics as PostgreSQL.
//!
//! Used by tests and local runs without a database. Every write happens under
//! one mutex and validates all references before mutating, so a failed write
//! leaves no trace.

use crate::models::{
    Bill, BillChanges, BillItem, BillLine, CreateCustomer, CreateService, Customer, NewBill,
    Service, UpdateCustomer, UpdateService,
};
use crate::services::store::{Store, StoreError, BILL_NUMBER_CONSTRAINT};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

const BILL_CUSTOMER_FK: &str = "bills_customer_id_fkey";
const ITEM_SERVICE_FK: &str = "bill_items_service_id_fkey";

#[derive(Default)]
struct State {
    customers: BTreeMap<i64, Customer>,
    services: BTreeMap<i64, Service>,
    bills: BTreeMap<i64, Bill>,
    last_customer_id: i64,
    last_service_id: i64,
    last_bill_id: i64,
    last_item_id: i64,
}

impl State {
    fn check_customer_ref(&self, customer_id: i64) -> Result<(), StoreError> {
        if self.customers.contains_key(&customer_id) {
            return Ok(());
        }
        Err(StoreError::ForeignKeyViolation {
            constraint: Some(BILL_CUSTOMER_FK.to_string()),
            message: format!(
                "insert or update on table \"bills\" violates foreign key constraint \"{}\"",
                BILL_CUSTOMER_FK
            ),
        })
    }

    fn check_service_refs(&self, lines: &[BillLine]) -> Result<(), StoreError> {
        match lines
            .iter()
            .find(|l| !self.services.contains_key(&l.service_id))
        {
            None => Ok(()),
            Some(_) => Err(StoreError::ForeignKeyViolation {
                constraint: Some(ITEM_SERVICE_FK.to_string()),
                message: format!(
                    "insert or update on table \"bill_items\" violates foreign key constraint \"{}\"",
                    ITEM_SERVICE_FK
                ),
            }),
        }
    }

    fn build_items(&mut self, bill_id: i64, lines: &[BillLine]) -> Vec<BillItem> {
        lines
            .iter()
            .enumerate()
            .map(|(position, line)| {
                self.last_item_id += 1;
                BillItem {
                    id: self.last_item_id,
                    bill_id,
                    service_id: line.service_id,
                    service_name: None,
                    position: position as i32,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    line_total: line.line_total,
                }
            })
            .collect()
    }

    /// Read projection: joins customer and service names in.
    fn project(&self, bill: &Bill) -> Bill {
        let mut bill = bill.clone();
        bill.customer_name = self.customers.get(&bill.customer_id).map(|c| c.name.clone());
        for item in &mut bill.items {
            item.service_name = self.services.get(&item.service_id).map(|s| s.name.clone());
        }
        bill
    }

    fn live_bill(&self, id: i64) -> Option<Bill> {
        self.bills
            .get(&id)
            .filter(|b| !b.is_deleted)
            .map(|b| self.project(b))
    }
}

/// Store kept entirely in memory.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        self.state
            .lock()
            .map_err(|e| StoreError::Backend(format!("Memory store mutex poisoned: {}", e)))
    }

    /// Raw bill row, soft-deleted or not.
    pub fn bill_row(&self, id: i64) -> Option<Bill> {
        let state = self.lock().ok()?;
        state.bills.get(&id).map(|b| state.project(b))
    }

    /// Number of bill rows, soft-deleted included.
    pub fn bill_row_count(&self) -> usize {
        self.lock().map(|s| s.bills.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        self.lock().map(|_| ())
    }

    async fn list_customers(&self) -> Result<Vec<Customer>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .customers
            .values()
            .filter(|c| !c.is_deleted)
            .cloned()
            .collect())
    }

    async fn get_customer(&self, id: i64) -> Result<Option<Customer>, StoreError> {
        let state = self.lock()?;
        Ok(state.customers.get(&id).filter(|c| !c.is_deleted).cloned())
    }

    async fn create_customer(&self, input: &CreateCustomer) -> Result<Customer, StoreError> {
        let mut state = self.lock()?;
        state.last_customer_id += 1;
        let now = Utc::now();
        let customer = Customer {
            id: state.last_customer_id,
            name: input.name.clone(),
            email: input.email.clone(),
            phone: input.phone.clone(),
            address: input.address.clone(),
            created_at: now,
            updated_at: now,
            is_deleted: false,
        };
        state.customers.insert(customer.id, customer.clone());
        Ok(customer)
    }

    async fn update_customer(
        &self,
        id: i64,
        input: &UpdateCustomer,
    ) -> Result<Option<Customer>, StoreError> {
        let mut state = self.lock()?;
        let Some(customer) = state.customers.get_mut(&id).filter(|c| !c.is_deleted) else {
            return Ok(None);
        };
        if let Some(name) = &input.name {
            customer.name = name.clone();
        }
        if let Some(email) = &input.email {
            customer.email = email.clone();
        }
        if let Some(phone) = &input.phone {
            customer.phone = phone.clone();
        }
        if let Some(address) = &input.address {
            customer.address = Some(address.clone());
        }
        customer.updated_at = Utc::now();
        Ok(Some(customer.clone()))
    }

    async fn delete_customer(&self, id: i64) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        match state.customers.get_mut(&id).filter(|c| !c.is_deleted) {
            Some(customer) => {
                customer.is_deleted = true;
                customer.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_services(&self) -> Result<Vec<Service>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .services
            .values()
            .filter(|s| !s.is_deleted)
            .cloned()
            .collect())
    }

    async fn get_service(&self, id: i64) -> Result<Option<Service>, StoreError> {
        let state = self.lock()?;
        Ok(state.services.get(&id).filter(|s| !s.is_deleted).cloned())
    }

    async fn create_service(&self, input: &CreateService) -> Result<Service, StoreError> {
        let mut state = self.lock()?;
        state.last_service_id += 1;
        let now = Utc::now();
        let service = Service {
            id: state.last_service_id,
            name: input.name.clone(),
            description: input.description.clone(),
            price: input.price,
            created_at: now,
            updated_at: now,
            is_deleted: false,
        };
        state.services.insert(service.id, service.clone());
        Ok(service)
    }

    async fn update_service(
        &self,
        id: i64,
        input: &UpdateService,
    ) -> Result<Option<Service>, StoreError> {
        let mut state = self.lock()?;
        let Some(service) = state.services.get_mut(&id).filter(|s| !s.is_deleted) else {
            return Ok(None);
        };
        if let Some(name) = &input.name {
            service.name = name.clone();
        }
        if let Some(description) = &input.description {
            service.description = Some(description.clone());
        }
        if let Some(price) = input.price {
            service.price = price;
        }
        service.updated_at = Utc::now();
        Ok(Some(service.clone()))
    }

    async fn delete_service(&self, id: i64) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        match state.services.get_mut(&id).filter(|s| !s.is_deleted) {
            Some(service) => {
                service.is_deleted = true;
                service.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_bills(&self) -> Result<Vec<Bill>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .bills
            .values()
            .filter(|b| !b.is_deleted)
            .map(|b| state.project(b))
            .collect())
    }

    async fn get_bill(&self, id: i64) -> Result<Option<Bill>, StoreError> {
        let state = self.lock()?;
        Ok(state.live_bill(id))
    }

    async fn max_bill_number_with_prefix(
        &self,
        prefix: &str,
    ) -> Result<Option<String>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .bills
            .values()
            .map(|b| &b.bill_number)
            .filter(|n| n.starts_with(prefix))
            .max()
            .cloned())
    }

    async fn insert_bill(&self, bill: &NewBill<'_>) -> Result<Bill, StoreError> {
        let mut state = self.lock()?;

        if state
            .bills
            .values()
            .any(|b| b.bill_number == bill.bill_number)
        {
            return Err(StoreError::UniqueViolation {
                constraint: Some(BILL_NUMBER_CONSTRAINT.to_string()),
                message: format!(
                    "duplicate key value violates unique constraint \"{}\"",
                    BILL_NUMBER_CONSTRAINT
                ),
            });
        }
        state.check_customer_ref(bill.customer_id)?;
        state.check_service_refs(&bill.draft.lines)?;

        state.last_bill_id += 1;
        let id = state.last_bill_id;
        let items = state.build_items(id, &bill.draft.lines);
        let now = Utc::now();
        state.bills.insert(
            id,
            Bill {
                id,
                bill_number: bill.bill_number.clone(),
                customer_id: bill.customer_id,
                customer_name: None,
                items,
                total: bill.draft.total,
                date: bill.date,
                is_paid: bill.is_paid,
                created_at: now,
                updated_at: now,
                is_deleted: false,
            },
        );

        state
            .live_bill(id)
            .ok_or_else(|| StoreError::Backend(format!("Bill {} not readable after insert", id)))
    }

    async fn update_bill(
        &self,
        id: i64,
        changes: &BillChanges,
    ) -> Result<Option<Bill>, StoreError> {
        let mut state = self.lock()?;
        if !state.bills.get(&id).is_some_and(|b| !b.is_deleted) {
            return Ok(None);
        }

        if let Some(customer_id) = changes.customer_id {
            state.check_customer_ref(customer_id)?;
        }
        let items = match &changes.draft {
            Some(draft) => {
                state.check_service_refs(&draft.lines)?;
                Some((state.build_items(id, &draft.lines), draft.total))
            }
            None => None,
        };

        if let Some(bill) = state.bills.get_mut(&id) {
            if let Some(customer_id) = changes.customer_id {
                bill.customer_id = customer_id;
            }
            if let Some(date) = changes.date {
                bill.date = date;
            }
            if let Some(is_paid) = changes.is_paid {
                bill.is_paid = is_paid;
            }
            if let Some((items, total)) = items {
                bill.items = items;
                bill.total = total;
            }
            bill.updated_at = Utc::now();
        }

        Ok(state.live_bill(id))
    }

    async fn toggle_bill_paid(&self, id: i64) -> Result<Option<Bill>, StoreError> {
        let mut state = self.lock()?;
        match state.bills.get_mut(&id).filter(|b| !b.is_deleted) {
            Some(bill) => {
                bill.is_paid = !bill.is_paid;
                bill.updated_at = Utc::now();
            }
            None => return Ok(None),
        }
        Ok(state.live_bill(id))
    }

    async fn delete_bill(&self, id: i64) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        match state.bills.get_mut(&id).filter(|b| !b.is_deleted) {
            Some(bill) => {
                bill.is_deleted = true;
                bill.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
